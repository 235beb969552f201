//! Plain-text listings.

use std::fmt::Display;

/// Sort names and join them with `\n`, without a trailing newline.
pub fn name_listing<S: AsRef<str>>(names: &[S]) -> String {
    let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.join("\n")
}

/// One value per line, each line terminated by `\n`, in the given order.
pub fn value_lines<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut out = String::new();
    for value in values {
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}
