//! End-to-end jobs: dataset bytes in, artifacts on disk.

use std::path::Path;

use crate::config::{GeoipJob, GeositeJob};
use crate::error::{Error, Result};
use crate::export::{
    name_listing, write_atomic, write_geosite, write_ip_rule_sets, write_site_rule_sets,
    RuleSetOptions,
};
use crate::fetch::{fetch_release_file, InputData, ReleaseSource};
use crate::ip::{build_trie, decode_geoip, write_database, DatabaseOptions, IpVersion};
use crate::site::{build_table, decode_site_list};

/// What a geosite job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeositeReport {
    pub categories: usize,
    pub rules: usize,
    pub rule_sets: usize,
}

/// What a geoip job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoipReport {
    pub codes: usize,
    pub networks: usize,
    pub databases: usize,
    pub rule_sets: usize,
}

/// Fetch the job's dataset from the latest release and generate.
pub fn run_geosite_job<S: ReleaseSource + ?Sized>(
    source: &S,
    job: &GeositeJob,
    output_dir: &Path,
) -> Result<GeositeReport> {
    let release = source.latest_release(&job.repository)?;
    let data = fetch_release_file(source, &release, &job.input, job.verify_checksum)?;
    let data = InputData::Owned(data).decompress_if_gzip(&job.input)?;
    generate_geosite(job, data.as_ref(), output_dir)
}

/// Fetch the job's dataset from the latest release and generate.
pub fn run_geoip_job<S: ReleaseSource + ?Sized>(
    source: &S,
    job: &GeoipJob,
    output_dir: &Path,
) -> Result<GeoipReport> {
    let release = source.latest_release(&job.repository)?;
    let data = fetch_release_file(source, &release, &job.input, job.verify_checksum)?;
    let data = InputData::Owned(data).decompress_if_gzip(&job.input)?;
    generate_geoip(job, data, output_dir)
}

/// Decode a `GeoSiteList`, reconcile it and write `<output>.db`,
/// `<output>.txt` and the optional rule-set directory.
pub fn generate_geosite(job: &GeositeJob, data: &[u8], output_dir: &Path) -> Result<GeositeReport> {
    let entries = decode_site_list(data)?;
    let table = build_table(&entries, job.aggregate.as_ref())?;

    let db_path = output_dir.join(format!("{}.db", job.output));
    let db = write_geosite(&table);
    write_atomic(&db_path, &db)?;
    log::info!(
        "wrote {} ({} categories, {} bytes)",
        db_path.display(),
        table.len(),
        db.len()
    );

    let txt_path = output_dir.join(format!("{}.txt", job.output));
    write_atomic(&txt_path, name_listing(&table.names()).as_bytes())?;
    log::info!("wrote {}", txt_path.display());

    let rule_sets = match &job.rule_set_dir {
        Some(dir) => write_site_rule_sets(
            &table,
            &output_dir.join(dir),
            RuleSetOptions {
                optimize: job.optimize,
                compress: job.compress,
            },
        )?,
        None => 0,
    };

    Ok(GeositeReport {
        categories: table.len(),
        rules: table.rule_count(),
        rule_sets,
    })
}

/// Classify a GeoIP database and write `<output>.db` with every code, one
/// database per subset, `<output>.txt` and the optional rule-set directory.
pub fn generate_geoip<S: AsRef<[u8]>>(job: &GeoipJob, data: S, output_dir: &Path) -> Result<GeoipReport> {
    let (metadata, buckets) = decode_geoip(data)?;
    let version = IpVersion::from_u16(metadata.ip_version).ok_or_else(|| {
        Error::InvalidNetwork(format!("unsupported ip_version {}", metadata.ip_version))
    })?;

    let mut targets: Vec<(&str, Option<&[String]>)> = vec![(job.output.as_str(), None)];
    targets.extend(
        job.subsets
            .iter()
            .map(|subset| (subset.output.as_str(), Some(subset.codes.as_slice()))),
    );

    for (output, codes) in &targets {
        let (trie, labels) = build_trie(&buckets, *codes, version)?;
        let options = DatabaseOptions {
            database_type: job.database_type.clone(),
            languages: labels,
            record_size: metadata.record_size,
            ..Default::default()
        };
        let db = write_database(&trie, &options)?;
        let path = output_dir.join(format!("{}.db", output));
        write_atomic(&path, &db)?;
        log::info!(
            "wrote {} ({} codes, {} bytes)",
            path.display(),
            options.languages.len(),
            db.len()
        );
    }

    let txt_path = output_dir.join(format!("{}.txt", job.output));
    write_atomic(&txt_path, name_listing(&buckets.codes()).as_bytes())?;
    log::info!("wrote {}", txt_path.display());

    let rule_sets = match &job.rule_set_dir {
        Some(dir) => write_ip_rule_sets(
            &buckets,
            &output_dir.join(dir),
            RuleSetOptions {
                optimize: false,
                compress: job.compress,
            },
        )?,
        None => 0,
    };

    Ok(GeoipReport {
        codes: buckets.len(),
        networks: buckets.network_count(),
        databases: targets.len(),
        rule_sets,
    })
}
