//! Validation checks over the row-store and generated views.
//!
//! Findings are collected as human-readable strings, never raised: the
//! caller decides whether a non-empty list is fatal. Completeness
//! warnings (parent/child employment drift) are informational only.

use std::collections::BTreeMap;
use std::path::Path;

use jobatlas_shared::{OccupationRecord, RegionType, Result, parent_code};
use jobatlas_storage::Storage;

use crate::view::StaticView;

/// Relative tolerance for the parent/child employment completeness check.
const COMPLETENESS_TOLERANCE: f64 = 0.10;

/// Run validation checks on the database. Returns a list of findings.
pub async fn validate_storage(storage: &Storage) -> Result<Vec<String>> {
    let mut findings = Vec::new();

    let count = storage.record_count().await?;
    if count == 0 {
        findings.push("No occupation records in database".to_owned());
        return Ok(findings);
    }

    // Unknown region types would poison the joined query below, so they
    // are reported first and short-circuit the record-level checks.
    let mut region_types_ok = true;
    for raw in storage.region_types().await? {
        if raw.parse::<RegionType>().is_err() {
            findings.push(format!("Invalid region_type: {raw}"));
            region_types_ok = false;
        }
    }
    if !region_types_ok {
        return Ok(findings);
    }

    let records = storage.query_records(None).await?;

    let non_positive_employment = records.iter().filter(|r| r.employment <= 0).count();
    if non_positive_employment > 0 {
        findings.push(format!(
            "{non_positive_employment} records have non-positive employment"
        ));
    }

    let non_positive_wages = records.iter().filter(|r| r.mean_annual_wage <= 0).count();
    if non_positive_wages > 0 {
        findings.push(format!(
            "{non_positive_wages} records have non-positive wages"
        ));
    }

    let gdp_mismatches = records
        .iter()
        .filter(|r| (r.gdp - r.employment * r.mean_annual_wage).abs() > 1)
        .count();
    if gdp_mismatches > 0 {
        findings.push(format!(
            "{gdp_mismatches} records have GDP != employment * wage"
        ));
    }

    let out_of_range = records
        .iter()
        .filter(|r| !(0.0..=1.0).contains(&r.complexity_score))
        .count();
    if out_of_range > 0 {
        findings.push(format!(
            "{out_of_range} records have complexity_score outside [0, 1]"
        ));
    }

    let duplicates = storage.duplicate_key_count().await?;
    if duplicates > 0 {
        findings.push(format!(
            "{duplicates} duplicate year/region/code combinations"
        ));
    }

    Ok(findings)
}

/// Compare each parent code's employment with the sum of its children,
/// per region. Returns warnings for discrepancies beyond tolerance.
///
/// Level-4 and level-5 codes have no children and are skipped as
/// parents. A zero children-sum means the region simply does not carry
/// that branch in more detail, which is not a discrepancy.
pub fn completeness_warnings(records: &[OccupationRecord]) -> Vec<String> {
    let mut by_region: BTreeMap<&str, Vec<&OccupationRecord>> = BTreeMap::new();
    for record in records {
        by_region.entry(record.region.as_str()).or_default().push(record);
    }

    let mut warnings = Vec::new();
    for (region, region_records) in by_region {
        let by_code: BTreeMap<&str, &OccupationRecord> = region_records
            .iter()
            .map(|r| (r.occupation_code.as_str(), *r))
            .collect();

        for (code, record) in &by_code {
            if record.level() >= 4 {
                continue;
            }
            let mut children_employment: i64 = 0;
            for (child_code, child) in &by_code {
                if child_code == code {
                    continue;
                }
                if parent_code(child_code).as_deref() == Some(*code) {
                    children_employment += child.employment;
                }
            }

            if children_employment > 0 && record.employment > 0 {
                let ratio = children_employment as f64 / record.employment as f64;
                if (ratio - 1.0).abs() > COMPLETENESS_TOLERANCE {
                    warnings.push(format!(
                        "{region} {code}: children sum={children_employment} \
                         vs parent={} (ratio={ratio:.2})",
                        record.employment
                    ));
                }
            }
        }
    }
    warnings
}

/// Structural checks on a built view. Returns a list of findings.
pub fn validate_view(view: &StaticView) -> Vec<String> {
    let mut findings = Vec::new();

    if view.metadata.years.is_empty() {
        findings.push("metadata missing 'years'".to_owned());
    }
    if view.metadata.last_updated.is_empty() {
        findings.push("metadata missing 'lastUpdated'".to_owned());
    }
    if view.regions.is_empty() {
        findings.push("regions array is empty".to_owned());
    }
    if view.occupations.is_empty() {
        findings.push("occupations array is empty".to_owned());
    }
    if view.region_data.is_empty() {
        findings.push("regionData is empty".to_owned());
    }

    for (region_id, years) in &view.region_data {
        for (year, records) in years {
            for record in records {
                if !(0.0..=1.0).contains(&record.complexity) {
                    findings.push(format!(
                        "{region_id}/{year}/{}: complexity out of range: {}",
                        record.soc_code, record.complexity
                    ));
                }
            }
        }
    }

    findings
}

/// Validate an exported view file on disk. A missing or unparseable
/// file is itself a finding, not an error.
pub fn validate_view_file(path: &Path) -> Vec<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return vec![format!("JSON file not found: {}", path.display())],
    };

    let view: StaticView = match serde_json::from_str(&content) {
        Ok(view) => view,
        Err(e) => return vec![format!("Invalid JSON in {}: {e}", path.display())],
    };

    validate_view(&view)
}
