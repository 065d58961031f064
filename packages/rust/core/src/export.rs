//! Export of view files: country-year main file, per-level extensions,
//! the meta catalog, and research CSVs.
//!
//! Output layout per country-year:
//! - `jobs-data-{short}-{year}.json` — main data, levels 1-2
//! - `jobs-data-{short}-{year}-{level}.json` — one per level > 2,
//!   written only when that level has records
//! - `jobs-data.json` — meta catalog listing exactly the extension
//!   files that exist

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use jobatlas_shared::{
    JobAtlasError, MajorGroupTable, OccupationRecord, Result, code_level, country,
    country_short,
};

use crate::view::{LevelFilter, StaticView, build_view};

/// File name of the meta catalog.
pub const META_FILE_NAME: &str = "jobs-data.json";

/// File name of the main country-year file (levels 1-2).
pub fn main_file_name(short: &str, year: i32) -> String {
    format!("jobs-data-{short}-{year}.json")
}

/// File name of a level-extension file.
pub fn level_file_name(short: &str, year: i32, level: u8) -> String {
    format!("jobs-data-{short}-{year}-{level}.json")
}

/// Statistics from a full country-year export.
#[derive(Debug, Clone)]
pub struct ExportStats {
    /// Region-records in the main (levels 1-2) file.
    pub main_records: usize,
    /// Region-records per written extension level.
    pub level_records: BTreeMap<u8, usize>,
    /// Every level present in the source records.
    pub levels_in_data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Meta catalog
// ---------------------------------------------------------------------------

/// One dataset entry in the meta catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDataset {
    pub country: String,
    pub year: i32,
    pub file: String,
    pub levels: Vec<u8>,
}

/// One country entry in the meta catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCountry {
    pub code: String,
    pub name: String,
}

/// The meta catalog enumerating all exported files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaCatalog {
    pub datasets: Vec<MetaDataset>,
    /// `"{short}-{year}"` -> level -> extension file name.
    pub level_files: BTreeMap<String, BTreeMap<String, String>>,
    pub countries: Vec<MetaCountry>,
    pub years: Vec<i32>,
    pub last_updated: String,
}

/// Inputs for one country-year entry of the meta catalog.
#[derive(Debug, Clone)]
pub struct MetaEntry {
    pub country_code: String,
    pub year: i32,
    /// Extension levels (> 2) that were actually written.
    pub levels_available: Vec<u8>,
}

/// Build the meta catalog from per-country-year entries.
pub fn build_meta(entries: &[MetaEntry], last_updated: &str) -> MetaCatalog {
    let mut datasets = Vec::new();
    let mut level_files: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut countries_seen: BTreeMap<String, String> = BTreeMap::new();
    let mut years_seen: std::collections::BTreeSet<i32> = std::collections::BTreeSet::new();

    for entry in entries {
        let short = country_short(&entry.country_code);
        let name = country(&entry.country_code)
            .map(|c| c.name.to_owned())
            .unwrap_or_else(|| entry.country_code.clone());

        countries_seen.insert(short.clone(), name);
        years_seen.insert(entry.year);

        datasets.push(MetaDataset {
            country: short.clone(),
            year: entry.year,
            file: main_file_name(&short, entry.year),
            levels: vec![1, 2],
        });

        let key = format!("{short}-{}", entry.year);
        let files = level_files.entry(key).or_default();
        for &level in &entry.levels_available {
            if level > 2 {
                files.insert(
                    level.to_string(),
                    level_file_name(&short, entry.year, level),
                );
            }
        }
    }

    MetaCatalog {
        datasets,
        level_files,
        countries: countries_seen
            .into_iter()
            .map(|(code, name)| MetaCountry { code, name })
            .collect(),
        years: years_seen.into_iter().collect(),
        last_updated: last_updated.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// JSON file writing
// ---------------------------------------------------------------------------

/// Write a value as pretty-printed JSON, creating parent directories.
/// Returns the byte size written.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| JobAtlasError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| JobAtlasError::Export(format!("serialize {}: {e}", path.display())))?;
    std::fs::write(path, &json).map_err(|e| JobAtlasError::io(path, e))?;
    Ok(json.len() as u64)
}

/// Export the main country-year file (levels 1-2). Returns the built
/// view and its record count.
pub fn export_country_year(
    records: &[OccupationRecord],
    country_code: &str,
    year: i32,
    export_dir: &Path,
    groups: &MajorGroupTable,
    last_updated: &str,
) -> Result<(StaticView, usize)> {
    let short = country_short(country_code);
    let year_records: Vec<OccupationRecord> = records
        .iter()
        .filter(|r| r.year == year)
        .cloned()
        .collect();

    let mut view = build_view(&year_records, LevelFilter::Max(2), groups, last_updated);
    view.metadata.country = Some(short.clone());

    let path = export_dir.join(main_file_name(&short, year));
    let size = write_json(&view, &path)?;
    let count = view.record_count();
    tracing::info!(
        file = %path.display(),
        occupations = view.occupations.len(),
        records = count,
        bytes = size,
        "wrote main export"
    );
    Ok((view, count))
}

/// Export one level-extension file. Nothing is written when the level
/// has no records; returns the record count either way.
pub fn export_level_file(
    records: &[OccupationRecord],
    country_code: &str,
    year: i32,
    level: u8,
    export_dir: &Path,
    groups: &MajorGroupTable,
    last_updated: &str,
) -> Result<usize> {
    let short = country_short(country_code);
    let year_records: Vec<OccupationRecord> = records
        .iter()
        .filter(|r| r.year == year)
        .cloned()
        .collect();

    let mut view = build_view(&year_records, LevelFilter::Exact(level), groups, last_updated);
    view.metadata.country = Some(short.clone());

    let count = view.record_count();
    if count == 0 {
        return Ok(0);
    }

    let path = export_dir.join(level_file_name(&short, year, level));
    let size = write_json(&view, &path)?;
    tracing::info!(
        file = %path.display(),
        level,
        records = count,
        bytes = size,
        "wrote level extension"
    );
    Ok(count)
}

/// Export everything for one country-year: main file, non-empty level
/// extensions, and a meta catalog listing exactly those extensions.
pub fn export_all(
    records: &[OccupationRecord],
    country_code: &str,
    year: i32,
    export_dir: &Path,
    groups: &MajorGroupTable,
    last_updated: &str,
) -> Result<ExportStats> {
    let (_view, main_records) =
        export_country_year(records, country_code, year, export_dir, groups, last_updated)?;

    let mut levels_in_data: Vec<u8> = records
        .iter()
        .filter(|r| r.year == year)
        .map(|r| code_level(&r.occupation_code))
        .collect::<std::collections::BTreeSet<u8>>()
        .into_iter()
        .collect();
    levels_in_data.sort_unstable();

    let mut level_records = BTreeMap::new();
    for &level in &levels_in_data {
        if level <= 2 {
            continue;
        }
        let count = export_level_file(
            records,
            country_code,
            year,
            level,
            export_dir,
            groups,
            last_updated,
        )?;
        if count > 0 {
            level_records.insert(level, count);
        }
    }

    let meta = build_meta(
        &[MetaEntry {
            country_code: country_code.to_owned(),
            year,
            levels_available: level_records.keys().copied().collect(),
        }],
        last_updated,
    );
    write_json(&meta, &export_dir.join(META_FILE_NAME))?;

    Ok(ExportStats {
        main_records,
        level_records,
        levels_in_data,
    })
}

// ---------------------------------------------------------------------------
// Research CSVs
// ---------------------------------------------------------------------------

/// Column order of the research CSV files.
const CSV_COLUMNS: [&str; 11] = [
    "country",
    "year",
    "region_type",
    "region",
    "occupation_code",
    "occupation_title",
    "major_group_name",
    "employment",
    "mean_annual_wage",
    "gdp",
    "complexity_score",
];

/// Write occupation records as a flat research CSV. Returns row count.
pub fn write_research_csv(records: &[OccupationRecord], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| JobAtlasError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| JobAtlasError::Export(format!("{}: {e}", path.display())))?;
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|e| JobAtlasError::Export(e.to_string()))?;

    for record in records {
        writer
            .write_record([
                record.country_code.clone(),
                record.year.to_string(),
                record.region_type.as_str().to_owned(),
                record.region.clone(),
                record.occupation_code.clone(),
                record.occupation_title.clone(),
                record.major_group_name.clone(),
                record.employment.to_string(),
                record.mean_annual_wage.to_string(),
                record.gdp.to_string(),
                record.complexity_score.to_string(),
            ])
            .map_err(|e| JobAtlasError::Export(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| JobAtlasError::io(path, e))?;
    Ok(records.len())
}

/// Write the research CSV set: everything combined, plus US national and
/// per-state slices. Returns file name -> row count.
pub fn export_research_csvs(
    records: &[OccupationRecord],
    export_dir: &Path,
) -> Result<BTreeMap<String, usize>> {
    use jobatlas_shared::RegionType;

    let mut results = BTreeMap::new();

    let count = write_research_csv(records, &export_dir.join("combined_data.csv"))?;
    results.insert("combined_data.csv".to_owned(), count);

    let us_national: Vec<OccupationRecord> = records
        .iter()
        .filter(|r| r.country_code == "USA" && r.region_type == RegionType::National)
        .cloned()
        .collect();
    let count = write_research_csv(&us_national, &export_dir.join("us_national.csv"))?;
    results.insert("us_national.csv".to_owned(), count);

    let us_states: Vec<OccupationRecord> = records
        .iter()
        .filter(|r| r.country_code == "USA" && r.region_type == RegionType::State)
        .cloned()
        .collect();
    let count = write_research_csv(&us_states, &export_dir.join("us_by_state.csv"))?;
    results.insert("us_by_state.csv".to_owned(), count);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobatlas_shared::{MAJOR_GROUPS, RegionType};

    fn record(code: &str, region_type: RegionType, region: &str, employment: i64) -> OccupationRecord {
        OccupationRecord {
            year: 2024,
            region_type,
            region: region.into(),
            country_code: "USA".into(),
            occupation_code: code.into(),
            occupation_title: format!("Occupation {code}"),
            major_group_name: "Management".into(),
            employment,
            mean_annual_wage: 100_000,
            gdp: employment * 100_000,
            complexity_score: 0.5,
        }
    }

    fn sample_records() -> Vec<OccupationRecord> {
        vec![
            record("11-0000", RegionType::National, "United States", 9000),
            record("11-1000", RegionType::National, "United States", 3000),
            record("11-1011", RegionType::National, "United States", 200),
            record("11-0000", RegionType::State, "California", 1080),
        ]
    }

    #[test]
    fn file_names() {
        assert_eq!(main_file_name("us", 2024), "jobs-data-us-2024.json");
        assert_eq!(level_file_name("us", 2024, 3), "jobs-data-us-2024-3.json");
    }

    #[test]
    fn main_export_is_levels_one_and_two() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (view, count) = export_country_year(
            &sample_records(),
            "USA",
            2024,
            tmp.path(),
            &MAJOR_GROUPS,
            "2026-08-07",
        )
        .expect("export");

        assert_eq!(view.metadata.country.as_deref(), Some("us"));
        assert_eq!(view.metadata.max_level, Some(2));
        assert_eq!(view.occupations.len(), 2);
        assert_eq!(count, 3); // two national + one state record survive

        let path = tmp.path().join("jobs-data-us-2024.json");
        assert!(path.exists());
        let parsed: StaticView =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read"))
                .expect("parse");
        for occupation in &parsed.occupations {
            assert!(occupation.level <= 2);
        }
    }

    #[test]
    fn empty_level_writes_no_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        // No level-3 codes in the sample.
        let count = export_level_file(
            &sample_records(),
            "USA",
            2024,
            3,
            tmp.path(),
            &MAJOR_GROUPS,
            "2026-08-07",
        )
        .expect("export");
        assert_eq!(count, 0);
        assert!(!tmp.path().join("jobs-data-us-2024-3.json").exists());
    }

    #[test]
    fn export_all_keeps_catalog_consistent_with_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let stats = export_all(
            &sample_records(),
            "USA",
            2024,
            tmp.path(),
            &MAJOR_GROUPS,
            "2026-08-07",
        )
        .expect("export all");

        assert_eq!(stats.levels_in_data, vec![1, 2, 5]);
        assert_eq!(stats.level_records.keys().copied().collect::<Vec<_>>(), vec![5]);

        let meta: MetaCatalog = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join(META_FILE_NAME)).expect("read meta"),
        )
        .expect("parse meta");

        assert_eq!(meta.datasets.len(), 1);
        assert_eq!(meta.datasets[0].file, "jobs-data-us-2024.json");
        assert_eq!(meta.years, vec![2024]);

        // The catalog lists exactly the extension files that exist.
        let listed = &meta.level_files["us-2024"];
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["5"], "jobs-data-us-2024-5.json");
        assert!(tmp.path().join("jobs-data-us-2024-5.json").exists());
        assert!(!tmp.path().join("jobs-data-us-2024-3.json").exists());
        assert!(!tmp.path().join("jobs-data-us-2024-4.json").exists());
    }

    #[test]
    fn meta_catalog_structure() {
        let meta = build_meta(
            &[MetaEntry {
                country_code: "USA".into(),
                year: 2024,
                levels_available: vec![3, 4, 5],
            }],
            "2026-08-07",
        );

        assert_eq!(meta.countries.len(), 1);
        assert_eq!(meta.countries[0].code, "us");
        assert_eq!(meta.countries[0].name, "United States");
        let files = &meta.level_files["us-2024"];
        assert_eq!(files["3"], "jobs-data-us-2024-3.json");
        assert_eq!(files["4"], "jobs-data-us-2024-4.json");
        assert_eq!(files["5"], "jobs-data-us-2024-5.json");

        let json = serde_json::to_string(&meta).expect("serialize");
        assert!(json.contains("\"levelFiles\""));
        assert!(json.contains("\"lastUpdated\""));
    }

    #[test]
    fn research_csvs_split_by_region_type() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let results = export_research_csvs(&sample_records(), tmp.path()).expect("export");
        assert_eq!(results["combined_data.csv"], 4);
        assert_eq!(results["us_national.csv"], 3);
        assert_eq!(results["us_by_state.csv"], 1);

        let content = std::fs::read_to_string(tmp.path().join("us_by_state.csv"))
            .expect("read csv");
        let mut lines = content.lines();
        assert!(lines.next().expect("header").starts_with("country,year,region_type"));
        assert!(lines.next().expect("row").contains("California"));
    }
}
