//! End-to-end tests for the domain pipeline.

use std::cell::RefCell;
use std::fs;

use geox::binary::RuleSetReader;
use geox::export::read_geosite;
use geox::fetch::{Release, ReleaseAsset, ReleaseSource};
use geox::pipeline::{generate_geosite, run_geosite_job};
use geox::site::decoder::proto::{Attribute, Domain, DomainType, GeoSite, GeoSiteList};
use geox::{Error, GeositeJob, MatchRule, Result};
use prost::Message;
use sha2::{Digest, Sha256};

fn domain(kind: DomainType, value: &str, tags: &[&str]) -> Domain {
    Domain {
        r#type: kind as i32,
        value: value.to_string(),
        attribute: tags
            .iter()
            .map(|tag| Attribute {
                key: tag.to_string(),
            })
            .collect(),
    }
}

fn site(code: &str, domains: Vec<Domain>) -> GeoSite {
    GeoSite {
        country_code: code.to_string(),
        domain: domains,
    }
}

fn encode(entries: Vec<GeoSite>) -> Vec<u8> {
    GeoSiteList { entry: entries }.encode_to_vec()
}

fn job(output: &str) -> GeositeJob {
    GeositeJob::new("v2fly/domain-list-community", "dlc.dat", output)
}

#[test]
fn test_root_domain_category() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![site(
        "CN",
        vec![domain(DomainType::RootDomain, "example.com", &[])],
    )]);

    let report = generate_geosite(&job("geosite"), &data, dir.path()).unwrap();
    // "cn" plus the always-written aggregation target.
    assert_eq!(report.categories, 2);
    assert_eq!(report.rule_sets, 0);

    let sites = read_geosite(&fs::read(dir.path().join("geosite.db")).unwrap()).unwrap();
    assert_eq!(
        sites["cn"],
        vec![
            MatchRule::domain("example.com"),
            MatchRule::suffix(".example.com"),
        ]
    );

    let listing = fs::read_to_string(dir.path().join("geosite.txt")).unwrap();
    assert!(listing.lines().any(|line| line == "cn"));
}

#[test]
fn test_tag_named_after_base_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![site(
        "CN",
        vec![
            domain(DomainType::Full, "a.cn", &["cn"]),
            domain(DomainType::Plain, "baidu", &["cn"]),
            domain(DomainType::Full, "b.cn", &[]),
        ],
    )]);

    generate_geosite(&job("geosite"), &data, dir.path()).unwrap();

    let sites = read_geosite(&fs::read(dir.path().join("geosite.db")).unwrap()).unwrap();
    assert!(!sites.contains_key("cn@cn"));
    assert_eq!(
        sites["cn"],
        vec![
            MatchRule::domain("a.cn"),
            MatchRule::keyword("baidu"),
            MatchRule::domain("b.cn"),
        ]
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("geosite.txt")).unwrap(),
        "cn\ngeolocation-cn"
    );
    assert!(sites["geolocation-cn"].is_empty());
}

#[test]
fn test_exclusion_and_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![
        site(
            "GEOLOCATION-CN",
            vec![
                domain(DomainType::Full, "a.cn", &[]),
                domain(DomainType::Full, "b.com", &["!cn"]),
                domain(DomainType::Full, "c.cn", &[]),
            ],
        ),
        site(
            "CATEGORY-GAMES",
            vec![
                domain(DomainType::Full, "game.cn", &["cn"]),
                domain(DomainType::Full, "game.com", &[]),
            ],
        ),
        site(
            "CATEGORY-ADS-CN",
            vec![domain(DomainType::Full, "ads.cn", &["cn"])],
        ),
    ]);

    generate_geosite(&job("geosite"), &data, dir.path()).unwrap();
    let sites = read_geosite(&fs::read(dir.path().join("geosite.db")).unwrap()).unwrap();

    assert!(!sites.contains_key("geolocation-cn@!cn"));
    // "category-ads-cn@cn" is named after its base and vanishes.
    assert!(!sites.contains_key("category-ads-cn@cn"));
    assert!(sites.contains_key("category-games@cn"));

    let merged = &sites["geolocation-cn"];
    assert!(merged.contains(&MatchRule::domain("a.cn")));
    assert!(merged.contains(&MatchRule::domain("c.cn")));
    assert!(merged.contains(&MatchRule::domain("game.cn")));
    assert!(!merged.contains(&MatchRule::domain("b.com")));
    assert!(!merged.contains(&MatchRule::domain("ads.cn")));
    assert_eq!(merged.len(), 3);

    let listing = fs::read_to_string(dir.path().join("geosite.txt")).unwrap();
    assert_eq!(
        listing,
        "category-ads-cn\ncategory-games\ncategory-games@cn\ngeolocation-cn"
    );
}

#[test]
fn test_aggregation_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![site(
        "CATEGORY-GAMES",
        vec![domain(DomainType::Full, "game.cn", &["cn"])],
    )]);

    let mut job = job("geosite");
    job.aggregate = None;
    generate_geosite(&job, &data, dir.path()).unwrap();

    let sites = read_geosite(&fs::read(dir.path().join("geosite.db")).unwrap()).unwrap();
    assert!(!sites.contains_key("geolocation-cn"));
    assert_eq!(
        fs::read_to_string(dir.path().join("geosite.txt")).unwrap(),
        "category-games\ncategory-games@cn"
    );
}

#[test]
fn test_malformed_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = generate_geosite(&job("geosite"), &[0x0a, 0xff], dir.path()).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(!dir.path().join("geosite.db").exists());
}

/// Serves one release whose assets are held in memory.
struct StaticRelease {
    files: Vec<(String, Vec<u8>)>,
    fetched: RefCell<Vec<String>>,
}

impl ReleaseSource for StaticRelease {
    fn latest_release(&self, repository: &str) -> Result<Release> {
        self.fetched.borrow_mut().push(repository.to_string());
        Ok(Release {
            name: Some("latest".to_string()),
            tag_name: "latest".to_string(),
            assets: self
                .files
                .iter()
                .map(|(name, _)| ReleaseAsset {
                    name: name.clone(),
                    browser_download_url: format!("mem://{}", name),
                })
                .collect(),
        })
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        self.files
            .iter()
            .find(|(name, _)| *name == asset.name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::AssetNotFound {
                asset: asset.name.clone(),
                release: "latest".to_string(),
            })
    }
}

#[test]
fn test_run_job_from_release() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![
        site(
            "GOOGLE",
            vec![
                domain(DomainType::RootDomain, "google.com", &[]),
                domain(DomainType::Regex, "^ads?\\.google\\.", &["ads"]),
            ],
        ),
        site("LOCAL", vec![domain(DomainType::RootDomain, "localhost", &[])]),
    ]);
    let checksum = format!("{:x}  dlc.dat\n", Sha256::digest(&data));
    let source = StaticRelease {
        files: vec![
            ("dlc.dat".to_string(), data),
            ("dlc.dat.sha256sum".to_string(), checksum.into_bytes()),
        ],
        fetched: RefCell::new(Vec::new()),
    };

    let mut job = job("geosite-lite");
    job.rule_set_dir = Some("rule-set".to_string());
    let report = run_geosite_job(&source, &job, dir.path()).unwrap();
    assert_eq!(report.categories, 4);
    assert_eq!(report.rule_sets, 4);
    assert_eq!(
        source.fetched.borrow().as_slice(),
        ["v2fly/domain-list-community".to_string()]
    );

    let rule_sets = dir.path().join("rule-set");
    let local = fs::read_to_string(rule_sets.join("geosite-local.txt")).unwrap();
    assert_eq!(local, ".localhost\n");

    let google = RuleSetReader::from_bytes(&fs::read(rule_sets.join("geosite-google.rset")).unwrap())
        .unwrap();
    assert!(google.match_domain("google.com"));
    assert!(google.match_domain("mail.google.com"));
    assert!(google.match_domain("ads.google.de"));
    assert!(!google.match_domain("notgoogle.com"));

    let ads = RuleSetReader::from_bytes(&fs::read(rule_sets.join("geosite-google@ads.rset")).unwrap())
        .unwrap();
    assert!(ads.match_domain("ad.google.com"));
    assert!(!ads.match_domain("mail.google.com"));
}

#[test]
fn test_run_job_checksum_mismatch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let data = encode(vec![site("CN", vec![domain(DomainType::Full, "a.cn", &[])])]);
    let source = StaticRelease {
        files: vec![
            ("dlc.dat".to_string(), data),
            ("dlc.dat.sha256sum".to_string(), vec![b'0'; 64]),
        ],
        fetched: RefCell::new(Vec::new()),
    };

    let err = run_geosite_job(&source, &job("geosite-lite"), dir.path()).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
