//! Per-category rule-set directories.

use std::fs;
use std::path::{Path, PathBuf};

use super::text::value_lines;
use super::write_atomic;
use crate::binary::RuleSetWriter;
use crate::error::Result;
use crate::ip::IpBucketTable;
use crate::site::{CategoryTable, CompiledRules};

/// Options for rule-set generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSetOptions {
    /// Drop exact domains already covered by a suffix rule
    pub optimize: bool,
    /// zlib-compress each rule-set body
    pub compress: bool,
}

/// Path of one rule-set file, `<dir>/<prefix>-<name>.<extension>`.
pub fn rule_set_path(dir: &Path, prefix: &str, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}-{}.{}", prefix, name, extension))
}

/// Write `geosite-<name>.rset` and `geosite-<name>.txt` for every category.
///
/// Returns the number of categories written.
pub fn write_site_rule_sets(table: &CategoryTable, dir: &Path, options: RuleSetOptions) -> Result<usize> {
    fs::create_dir_all(dir)?;

    let mut written = 0;
    for (category, rules) in table.iter() {
        let compiled = if options.optimize {
            CompiledRules::compile_optimized(rules)
        } else {
            CompiledRules::compile(rules)
        };
        let mut writer = RuleSetWriter::new().compressed(options.compress);
        writer.add_compiled(&compiled)?;

        let name = category.to_string();
        write_atomic(&rule_set_path(dir, "geosite", &name, "rset"), &writer.build()?)?;
        write_atomic(
            &rule_set_path(dir, "geosite", &name, "txt"),
            value_lines(rules.iter().map(|rule| &rule.value)).as_bytes(),
        )?;
        written += 1;
    }

    log::info!("wrote {} geosite rule-sets to {}", written, dir.display());
    Ok(written)
}

/// Write `geoip-<code>.rset` and `geoip-<code>.txt` for every code.
pub fn write_ip_rule_sets(buckets: &IpBucketTable, dir: &Path, options: RuleSetOptions) -> Result<usize> {
    fs::create_dir_all(dir)?;

    let mut written = 0;
    for (code, networks) in buckets.iter() {
        let mut writer = RuleSetWriter::new().compressed(options.compress);
        writer.add_cidrs(networks);

        write_atomic(&rule_set_path(dir, "geoip", code, "rset"), &writer.build()?)?;
        write_atomic(
            &rule_set_path(dir, "geoip", code, "txt"),
            value_lines(networks).as_bytes(),
        )?;
        written += 1;
    }

    log::info!("wrote {} geoip rule-sets to {}", written, dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::RuleSetReader;
    use crate::ip::IpNetworkRecord;
    use crate::rule_type::MatchRule;
    use crate::site::Category;

    #[test]
    fn test_site_rule_sets() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = CategoryTable::new();
        table.insert(
            Category::base("cn"),
            vec![
                MatchRule::domain("example.cn"),
                MatchRule::suffix(".example.cn"),
            ],
        );
        table.insert(
            Category::tagged("category-ads", "cn"),
            vec![MatchRule::keyword("adserver")],
        );

        let written = write_site_rule_sets(&table, dir.path(), RuleSetOptions::default()).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(dir.path().join("geosite-cn.txt")).unwrap();
        assert_eq!(text, "example.cn\n.example.cn\n");

        let data = fs::read(dir.path().join("geosite-category-ads@cn.rset")).unwrap();
        let reader = RuleSetReader::from_bytes(&data).unwrap();
        assert!(reader.match_domain("adserver.example.org"));
        assert!(!reader.match_domain("example.cn"));
    }

    #[test]
    fn test_optimized_rule_set_keeps_matches() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = CategoryTable::new();
        table.insert(
            Category::base("x"),
            vec![MatchRule::domain("www.x.com"), MatchRule::suffix(".x.com")],
        );
        let options = RuleSetOptions {
            optimize: true,
            compress: true,
        };
        write_site_rule_sets(&table, dir.path(), options).unwrap();

        let data = fs::read(dir.path().join("geosite-x.rset")).unwrap();
        let reader = RuleSetReader::from_bytes(&data).unwrap();
        assert_eq!(reader.count(crate::binary::SliceType::DomainExact), 0);
        assert!(reader.match_domain("www.x.com"));
    }

    #[test]
    fn test_ip_rule_sets() {
        let dir = tempfile::tempdir().unwrap();
        let mut buckets = IpBucketTable::new();
        for network in ["1.0.1.0/24", "240e::/20"] {
            buckets.push(IpNetworkRecord {
                network: network.parse().unwrap(),
                code: "cn".to_string(),
            });
        }

        let written = write_ip_rule_sets(&buckets, dir.path(), RuleSetOptions::default()).unwrap();
        assert_eq!(written, 1);

        let text = fs::read_to_string(dir.path().join("geoip-cn.txt")).unwrap();
        assert_eq!(text, "1.0.1.0/24\n240e::/20\n");

        let data = fs::read(dir.path().join("geoip-cn.rset")).unwrap();
        let reader = RuleSetReader::from_bytes(&data).unwrap();
        assert!(reader.match_ip("1.0.1.1".parse().unwrap()));
        assert!(reader.match_ip("240e::1".parse().unwrap()));
        assert!(!reader.match_ip("8.8.8.8".parse().unwrap()));
    }
}
