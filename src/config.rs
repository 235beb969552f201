//! Generator job configuration.
//!
//! Jobs are read from YAML; anything left out falls back to the built-in
//! defaults, and an empty file yields the default job list.
//!
//! ```yaml
//! geosite:
//!   - repository: v2fly/domain-list-community
//!     input: dlc.dat
//!     output: geosite-lite
//!     aggregate: null
//! geoip:
//!   - repository: soffchen/geoip
//!     input: Country.mmdb
//!     output: geoip
//!     subsets:
//!       - output: geoip-cn
//!         codes: [cn]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fetch::split_repository;
use crate::site::AggregateRule;

/// All generator jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_geosite_jobs")]
    pub geosite: Vec<GeositeJob>,
    #[serde(default = "default_geoip_jobs")]
    pub geoip: Vec<GeoipJob>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            geosite: default_geosite_jobs(),
            geoip: default_geoip_jobs(),
        }
    }
}

impl GenerateConfig {
    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&content)?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check repositories and output names.
    pub fn validate(&self) -> Result<()> {
        for job in &self.geosite {
            split_repository(&job.repository)?;
            check_name("geosite output", &job.output)?;
        }
        for job in &self.geoip {
            split_repository(&job.repository)?;
            check_name("geoip output", &job.output)?;
            for subset in &job.subsets {
                check_name("geoip subset output", &subset.output)?;
                if subset.codes.is_empty() {
                    return Err(Error::Config(format!(
                        "geoip subset {} has no codes",
                        subset.output
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One domain dataset to convert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeositeJob {
    /// `owner/name` of the GitHub repository publishing the dataset
    pub repository: String,
    /// Release asset name
    pub input: String,
    /// Base name of the `.db` and `.txt` outputs
    pub output: String,
    /// Directory for per-category rule-sets
    #[serde(default)]
    pub rule_set_dir: Option<String>,
    /// Drop exact domains covered by a suffix in rule-sets
    #[serde(default)]
    pub optimize: bool,
    /// zlib-compress rule-set files
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
    /// `null` disables aggregation
    #[serde(default = "default_aggregate")]
    pub aggregate: Option<AggregateRule>,
}

impl GeositeJob {
    pub fn new(repository: &str, input: &str, output: &str) -> Self {
        Self {
            repository: repository.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            rule_set_dir: None,
            optimize: false,
            compress: false,
            verify_checksum: true,
            aggregate: default_aggregate(),
        }
    }
}

/// One GeoIP dataset to convert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoipJob {
    pub repository: String,
    pub input: String,
    /// Base name of the full `.db` and the `.txt` code listing
    pub output: String,
    /// Extra databases restricted to some codes
    #[serde(default = "default_subsets")]
    pub subsets: Vec<GeoipSubset>,
    #[serde(default)]
    pub rule_set_dir: Option<String>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
    #[serde(default = "default_database_type")]
    pub database_type: String,
}

impl GeoipJob {
    pub fn new(repository: &str, input: &str, output: &str) -> Self {
        Self {
            repository: repository.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            subsets: default_subsets(),
            rule_set_dir: None,
            compress: false,
            verify_checksum: true,
            database_type: default_database_type(),
        }
    }
}

/// A database holding only some codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoipSubset {
    pub output: String,
    pub codes: Vec<String>,
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(Error::Config(format!("invalid {}: {:?}", what, name)));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_aggregate() -> Option<AggregateRule> {
    Some(AggregateRule::default())
}

fn default_database_type() -> String {
    "sing-geoip".to_string()
}

fn default_subsets() -> Vec<GeoipSubset> {
    vec![GeoipSubset {
        output: "geoip-cn".to_string(),
        codes: vec!["cn".to_string()],
    }]
}

fn default_geosite_jobs() -> Vec<GeositeJob> {
    let mut full = GeositeJob::new("Loyalsoldier/v2ray-rules-dat", "geosite.dat", "geosite-full");
    full.rule_set_dir = Some("rule-set".to_string());
    let lite = GeositeJob::new("v2fly/domain-list-community", "dlc.dat", "geosite-lite");
    vec![full, lite]
}

fn default_geoip_jobs() -> Vec<GeoipJob> {
    let mut job = GeoipJob::new("soffchen/geoip", "Country.mmdb", "geoip");
    job.rule_set_dir = Some("rule-set".to_string());
    vec![job]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_jobs() {
        let config = GenerateConfig::default();
        assert_eq!(config.geosite.len(), 2);
        assert_eq!(config.geosite[0].output, "geosite-full");
        assert_eq!(config.geosite[0].rule_set_dir.as_deref(), Some("rule-set"));
        assert_eq!(config.geosite[1].rule_set_dir, None);
        assert_eq!(config.geoip[0].subsets[0].codes, vec!["cn"]);
        assert_eq!(config.geoip[0].database_type, "sing-geoip");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(GenerateConfig::from_yaml("").unwrap(), GenerateConfig::default());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
geosite:
  - repository: v2fly/domain-list-community
    input: dlc.dat
    output: lite
    optimize: true
    aggregate: null
  - repository: a/b
    input: x.dat
    output: x
    aggregate:
      target: geolocation-us
      tag: us
      prefix: category-
geoip: []
"#;
        let config = GenerateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.geosite.len(), 2);
        assert!(config.geosite[0].optimize);
        assert!(config.geosite[0].verify_checksum);
        assert_eq!(config.geosite[0].aggregate, None);
        assert_eq!(
            config.geosite[1].aggregate.as_ref().map(|a| a.target.as_str()),
            Some("geolocation-us")
        );
        assert!(config.geoip.is_empty());
    }

    #[test]
    fn test_missing_aggregate_uses_default() {
        let yaml = "geosite:\n  - {repository: a/b, input: x.dat, output: x}\n";
        let config = GenerateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.geosite[0].aggregate, Some(AggregateRule::default()));
        assert_eq!(config.geoip, default_geoip_jobs());
    }

    #[test]
    fn test_validation() {
        let yaml = "geosite:\n  - {repository: nope, input: x.dat, output: x}\n";
        assert!(matches!(
            GenerateConfig::from_yaml(yaml),
            Err(Error::InvalidRepository(_))
        ));

        let yaml = "geoip:\n  - {repository: a/b, input: c.mmdb, output: ../x}\n";
        assert!(matches!(GenerateConfig::from_yaml(yaml), Err(Error::Config(_))));

        let yaml = "geoip:\n  - repository: a/b\n    input: c.mmdb\n    output: x\n    subsets: [{output: y, codes: []}]\n";
        assert!(matches!(GenerateConfig::from_yaml(yaml), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geox.yaml");
        std::fs::write(&path, "geoip: []\n").unwrap();
        let config = GenerateConfig::load(&path).unwrap();
        assert!(config.geoip.is_empty());
        assert_eq!(config.geosite.len(), 2);
    }
}
