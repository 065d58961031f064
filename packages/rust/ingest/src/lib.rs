//! CSV ingestion for occupational and survey data.
//!
//! Three input shapes are understood:
//! - per-region occupational CSVs (`occupation_code, occupation_title,
//!   employment, mean_annual_wage`), one file per national/state/metro
//!   region, located by filename stem;
//! - a combined CSV carrying `region_type`/`region` columns;
//! - survey task-ratings CSVs feeding the scoring engine.
//!
//! Malformed rows (bad numerics, unparseable fields) are dropped at the
//! row level and never abort a batch. Rows with occupation codes in no
//! supported format are counted as rejected and reported to the caller.

pub mod fetch;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use jobatlas_shared::{
    COUNTRIES, CodeSystem, JobAtlasError, MAJOR_GROUPS, OccupationInput, RegionType, Result,
    TaskRating, country, country_for_metro, derive_major_group, display_name_for_metro,
    display_name_for_state, metro_stem,
};
use jobatlas_storage::Storage;

/// Suffix shared by all per-region CSV files.
const REGION_CSV_SUFFIX: &str = "_occupational_data.csv";

/// Subdirectory of metro CSVs under the data directory.
const METROS_DIR: &str = "metros";

/// Counts from one import step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Records written to storage.
    pub imported: usize,
    /// Rows rejected for an unknown occupation-code format.
    pub rejected: usize,
}

impl ImportOutcome {
    fn merge(&mut self, other: ImportOutcome) {
        self.imported += other.imported;
        self.rejected += other.rejected;
    }
}

// ---------------------------------------------------------------------------
// CSV row shapes
// ---------------------------------------------------------------------------

/// One parsed row of a per-region occupational CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationRow {
    pub occupation_code: String,
    pub occupation_title: String,
    pub employment: i64,
    pub mean_annual_wage: i64,
}

/// One parsed row of a combined CSV (region columns inline).
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub year: Option<i32>,
    pub region_type: RegionType,
    pub region: String,
    pub occupation_code: String,
    pub occupation_title: String,
    pub major_group_name: String,
    pub employment: i64,
    pub mean_annual_wage: i64,
}

/// Raw field view of an occupational CSV row; numerics parsed leniently
/// afterwards so one bad cell drops one row, not the batch.
#[derive(Debug, Deserialize)]
struct RawOccupationRow {
    occupation_code: String,
    occupation_title: String,
    employment: String,
    mean_annual_wage: String,
}

#[derive(Debug, Deserialize)]
struct RawCombinedRow {
    #[serde(default)]
    year: String,
    region_type: String,
    region: String,
    occupation_code: String,
    occupation_title: String,
    major_group_name: String,
    employment: String,
    mean_annual_wage: String,
}

#[derive(Debug, Deserialize)]
struct RawTaskRatingRow {
    occupation_code: String,
    task_id: String,
    scale_id: String,
    #[serde(default)]
    data_value: String,
    #[serde(default)]
    recommend_suppress: String,
}

// ---------------------------------------------------------------------------
// CSV readers
// ---------------------------------------------------------------------------

/// Read a per-region occupational CSV.
pub fn read_occupation_rows(path: &Path) -> Result<Vec<OccupationRow>> {
    let mut rows = Vec::new();
    for raw in read_raw_rows::<RawOccupationRow>(path)? {
        let (Some(employment), Some(wage)) = (
            parse_count(&raw.employment),
            parse_count(&raw.mean_annual_wage),
        ) else {
            tracing::warn!(
                code = %raw.occupation_code,
                file = %path.display(),
                "dropping row with non-numeric employment or wage"
            );
            continue;
        };
        rows.push(OccupationRow {
            occupation_code: raw.occupation_code.trim().to_owned(),
            occupation_title: raw.occupation_title.trim().to_owned(),
            employment,
            mean_annual_wage: wage,
        });
    }
    Ok(rows)
}

/// Read a combined CSV with inline region columns.
pub fn read_combined_rows(path: &Path) -> Result<Vec<CombinedRow>> {
    let mut rows = Vec::new();
    for raw in read_raw_rows::<RawCombinedRow>(path)? {
        let Ok(region_type) = raw.region_type.trim().parse::<RegionType>() else {
            tracing::warn!(
                region_type = %raw.region_type,
                file = %path.display(),
                "dropping row with invalid region type"
            );
            continue;
        };
        let (Some(employment), Some(wage)) = (
            parse_count(&raw.employment),
            parse_count(&raw.mean_annual_wage),
        ) else {
            tracing::warn!(
                code = %raw.occupation_code,
                file = %path.display(),
                "dropping row with non-numeric employment or wage"
            );
            continue;
        };
        rows.push(CombinedRow {
            year: raw.year.trim().parse().ok(),
            region_type,
            region: raw.region.trim().to_owned(),
            occupation_code: raw.occupation_code.trim().to_owned(),
            occupation_title: raw.occupation_title.trim().to_owned(),
            major_group_name: raw.major_group_name.trim().to_owned(),
            employment,
            mean_annual_wage: wage,
        });
    }
    Ok(rows)
}

/// Read a survey task-ratings CSV.
///
/// Non-numeric data values survive as `None`; the scoring filter drops
/// them, keeping the "malformed importance is dropped, not errored"
/// contract in one place.
pub fn read_task_ratings(path: &Path) -> Result<Vec<TaskRating>> {
    let mut ratings = Vec::new();
    for raw in read_raw_rows::<RawTaskRatingRow>(path)? {
        ratings.push(TaskRating {
            occupation_code: raw.occupation_code.trim().to_owned(),
            task_id: raw.task_id.trim().to_owned(),
            scale_id: raw.scale_id.trim().to_owned(),
            data_value: raw.data_value.trim().parse().ok(),
            suppress: raw.recommend_suppress.trim() == "Y",
        });
    }
    Ok(ratings)
}

/// Deserialize every well-formed row of a headed CSV file, skipping rows
/// the deserializer cannot shape. Handles a UTF-8 BOM on the header.
fn read_raw_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| JobAtlasError::io(path, e))?;
    // Spreadsheet exports often lead with a UTF-8 BOM on the header row.
    let body = content.strip_prefix('\u{feff}').unwrap_or(content.as_str());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "dropping malformed CSV row");
            }
        }
    }
    Ok(rows)
}

/// Lenient count parser: accepts `1234`, `1234.0`, truncating toward
/// zero the way the upstream spreadsheets round-trip through floats.
fn parse_count(raw: &str) -> Option<i64> {
    raw.trim().parse::<f64>().ok().map(|v| v as i64)
}

// ---------------------------------------------------------------------------
// Storage imports
// ---------------------------------------------------------------------------

/// Import parsed rows into one region. Rows with codes in no supported
/// format are rejected (counted, skipped); the caller decides whether a
/// non-zero rejection count aborts the run.
pub async fn import_rows(
    storage: &Storage,
    rows: &[OccupationRow],
    region_id: i64,
    year: i32,
    code_system: CodeSystem,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    for row in rows {
        if CodeSystem::detect(&row.occupation_code).is_err() {
            tracing::warn!(code = %row.occupation_code, "rejecting row with unknown code format");
            outcome.rejected += 1;
            continue;
        }
        let major_group = derive_major_group(
            &row.occupation_code,
            &row.occupation_title,
            code_system,
            &MAJOR_GROUPS,
        );
        storage
            .upsert_occupation(
                year,
                region_id,
                &OccupationInput {
                    occupation_code: row.occupation_code.clone(),
                    occupation_title: row.occupation_title.clone(),
                    major_group_name: major_group,
                    employment: row.employment,
                    mean_annual_wage: row.mean_annual_wage,
                },
            )
            .await?;
        outcome.imported += 1;
    }
    Ok(outcome)
}

/// Import one country's national CSV. A missing file imports nothing.
pub async fn import_national(
    storage: &Storage,
    data_dir: &Path,
    country_code: &str,
    year: i32,
) -> Result<ImportOutcome> {
    let spec = country(country_code).ok_or_else(|| {
        JobAtlasError::validation(format!("unknown country code: {country_code}"))
    })?;

    let csv_path = data_dir.join(spec.national_csv);
    if !csv_path.exists() {
        tracing::info!(country = country_code, path = %csv_path.display(), "national CSV not found, skipping");
        return Ok(ImportOutcome::default());
    }

    let country_id = storage
        .ensure_country(spec.code, spec.name, spec.code_system, spec.currency)
        .await?;
    let region_id = storage
        .ensure_region(country_id, spec.national_region_name, RegionType::National)
        .await?;

    let rows = read_occupation_rows(&csv_path)?;
    let outcome = import_rows(storage, &rows, region_id, year, spec.code_system).await?;
    tracing::info!(
        country = country_code,
        imported = outcome.imported,
        rejected = outcome.rejected,
        "national import complete"
    );
    Ok(outcome)
}

/// Import all state CSVs for a country, if it has a states directory.
pub async fn import_states(
    storage: &Storage,
    data_dir: &Path,
    country_code: &str,
    year: i32,
) -> Result<ImportOutcome> {
    let spec = country(country_code).ok_or_else(|| {
        JobAtlasError::validation(format!("unknown country code: {country_code}"))
    })?;
    let Some(states_dir) = spec.states_dir else {
        return Ok(ImportOutcome::default());
    };

    let dir = data_dir.join(states_dir);
    if !dir.is_dir() {
        return Ok(ImportOutcome::default());
    }

    let country_id = storage
        .ensure_country(spec.code, spec.name, spec.code_system, spec.currency)
        .await?;

    let mut outcome = ImportOutcome::default();
    for csv_path in region_csv_files(&dir)? {
        let stem = file_stem(&csv_path);
        let display_name = display_name_for_state(&stem);
        let region_id = storage
            .ensure_region(country_id, &display_name, RegionType::State)
            .await?;
        let rows = read_occupation_rows(&csv_path)?;
        outcome.merge(import_rows(storage, &rows, region_id, year, spec.code_system).await?);
    }

    if outcome.imported > 0 {
        tracing::info!(
            country = country_code,
            imported = outcome.imported,
            "state imports complete"
        );
    }
    Ok(outcome)
}

/// Import all metro CSVs, mapping each stem to its country.
pub async fn import_metros(storage: &Storage, data_dir: &Path, year: i32) -> Result<ImportOutcome> {
    let dir = data_dir.join(METROS_DIR);
    if !dir.is_dir() {
        return Ok(ImportOutcome::default());
    }

    let mut outcome = ImportOutcome::default();
    for csv_path in region_csv_files(&dir)? {
        let stem = file_stem(&csv_path);
        let country_code = country_for_metro(&stem);
        let spec = country(country_code).ok_or_else(|| {
            JobAtlasError::validation(format!("unknown country code: {country_code}"))
        })?;

        let country_id = storage
            .ensure_country(spec.code, spec.name, spec.code_system, spec.currency)
            .await?;
        let display_name = display_name_for_metro(&stem);
        let region_id = storage
            .ensure_region(country_id, &display_name, RegionType::Metro)
            .await?;
        let rows = read_occupation_rows(&csv_path)?;
        outcome.merge(import_rows(storage, &rows, region_id, year, spec.code_system).await?);
    }

    if outcome.imported > 0 {
        tracing::info!(imported = outcome.imported, "metro imports complete");
    }
    Ok(outcome)
}

/// Import a combined CSV with inline region columns (always USA).
pub async fn import_combined(
    storage: &Storage,
    csv_path: &Path,
    default_year: i32,
) -> Result<ImportOutcome> {
    let spec = country("USA").ok_or_else(|| JobAtlasError::validation("USA not registered"))?;
    let country_id = storage
        .ensure_country(spec.code, spec.name, spec.code_system, spec.currency)
        .await?;

    let mut outcome = ImportOutcome::default();
    for row in read_combined_rows(csv_path)? {
        if CodeSystem::detect(&row.occupation_code).is_err() {
            tracing::warn!(code = %row.occupation_code, "rejecting row with unknown code format");
            outcome.rejected += 1;
            continue;
        }
        let region_id = storage
            .ensure_region(country_id, &row.region, row.region_type)
            .await?;
        storage
            .upsert_occupation(
                row.year.unwrap_or(default_year),
                region_id,
                &OccupationInput {
                    occupation_code: row.occupation_code.clone(),
                    occupation_title: row.occupation_title.clone(),
                    major_group_name: row.major_group_name.clone(),
                    employment: row.employment,
                    mean_annual_wage: row.mean_annual_wage,
                },
            )
            .await?;
        outcome.imported += 1;
    }

    tracing::info!(
        imported = outcome.imported,
        rejected = outcome.rejected,
        file = %csv_path.display(),
        "combined import complete"
    );
    Ok(outcome)
}

/// Import everything under the data directory: every country's national
/// CSV, then states, then metros.
pub async fn import_all(storage: &Storage, data_dir: &Path, year: i32) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();

    for spec in COUNTRIES {
        outcome.merge(import_national(storage, data_dir, spec.code, year).await?);
    }
    for spec in COUNTRIES {
        outcome.merge(import_states(storage, data_dir, spec.code, year).await?);
    }
    outcome.merge(import_metros(storage, data_dir, year).await?);

    Ok(outcome)
}

/// Sorted `*_occupational_data.csv` paths directly under `dir`.
fn region_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| JobAtlasError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(REGION_CSV_SUFFIX))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Region stem of a CSV path (`states/new_york_occupational_data.csv`
/// -> `new_york`).
fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    metro_stem(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write csv");
        path
    }

    #[test]
    fn occupation_rows_parse_quoted_titles_and_bom() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            tmp.path(),
            "rows.csv",
            "\u{feff}occupation_code,occupation_title,employment,mean_annual_wage\n\
             35-2014,\"Cooks, Restaurant\",1300000,32000.0\n",
        );

        let rows = read_occupation_rows(&path).expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].occupation_title, "Cooks, Restaurant");
        assert_eq!(rows[0].mean_annual_wage, 32_000);
    }

    #[test]
    fn malformed_numeric_rows_are_dropped() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            tmp.path(),
            "rows.csv",
            "occupation_code,occupation_title,employment,mean_annual_wage\n\
             11-0000,Management,9270000,126480\n\
             13-0000,Business,n/a,90000\n",
        );

        let rows = read_occupation_rows(&path).expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].occupation_code, "11-0000");
    }

    #[test]
    fn task_ratings_keep_malformed_values_as_none() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            tmp.path(),
            "ratings.csv",
            "occupation_code,task_id,scale_id,data_value,recommend_suppress\n\
             11-1011.00,100,IM,4.2,\n\
             11-1011.00,101,IM,not-a-number,Y\n",
        );

        let ratings = read_task_ratings(&path).expect("read");
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].data_value, Some(4.2));
        assert!(!ratings[0].suppress);
        assert_eq!(ratings[1].data_value, None);
        assert!(ratings[1].suppress);
    }

    #[tokio::test]
    async fn import_rows_rejects_unknown_code_formats() {
        let storage = Storage::open_in_memory().await.expect("open db");
        let country_id = storage
            .ensure_country("USA", "United States", CodeSystem::Soc, "USD")
            .await
            .expect("country");
        let region_id = storage
            .ensure_region(country_id, "United States", RegionType::National)
            .await
            .expect("region");

        let rows = vec![
            OccupationRow {
                occupation_code: "11-0000".into(),
                occupation_title: "Management Occupations".into(),
                employment: 9_270_000,
                mean_annual_wage: 126_480,
            },
            OccupationRow {
                occupation_code: "BOGUS".into(),
                occupation_title: "Nonsense".into(),
                employment: 1,
                mean_annual_wage: 1,
            },
        ];

        let outcome = import_rows(&storage, &rows, region_id, 2024, CodeSystem::Soc)
            .await
            .expect("import");
        assert_eq!(outcome, ImportOutcome { imported: 1, rejected: 1 });

        let records = storage.query_records(None).await.expect("query");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].major_group_name, "Management");
    }

    #[tokio::test]
    async fn import_national_skips_missing_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = Storage::open_in_memory().await.expect("open db");
        let outcome = import_national(&storage, tmp.path(), "USA", 2024)
            .await
            .expect("import");
        assert_eq!(outcome, ImportOutcome::default());
    }

    #[tokio::test]
    async fn import_all_walks_states_and_metros() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let header = "occupation_code,occupation_title,employment,mean_annual_wage\n";

        write_csv(
            tmp.path(),
            "us_occupational_data.csv",
            &format!("{header}11-0000,Management Occupations,9270000,126480\n"),
        );
        let states = tmp.path().join("states");
        std::fs::create_dir(&states).expect("mkdir states");
        write_csv(
            &states,
            "new_york_occupational_data.csv",
            &format!("{header}11-0000,Management Occupations,1110000,140000\n"),
        );
        let metros = tmp.path().join("metros");
        std::fs::create_dir(&metros).expect("mkdir metros");
        write_csv(
            &metros,
            "london_occupational_data.csv",
            &format!("{header}OC1,Managers,500000,60000\n"),
        );

        let storage = Storage::open_in_memory().await.expect("open db");
        let outcome = import_all(&storage, tmp.path(), 2024).await.expect("import");
        assert_eq!(outcome.imported, 3);
        assert_eq!(outcome.rejected, 0);

        let records = storage.query_records(None).await.expect("query");
        assert_eq!(records.len(), 3);

        let london: Vec<_> = records
            .iter()
            .filter(|r| r.country_code == "GBR")
            .collect();
        assert_eq!(london.len(), 1);
        assert_eq!(london[0].region, "London");
        assert_eq!(london[0].region_type, RegionType::Metro);
        // ISCO: the occupation title is the group name.
        assert_eq!(london[0].major_group_name, "Managers");

        let ny: Vec<_> = records.iter().filter(|r| r.region == "New York").collect();
        assert_eq!(ny.len(), 1);
        assert_eq!(ny[0].region_type, RegionType::State);
    }

    #[tokio::test]
    async fn combined_import_creates_regions_per_row() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            tmp.path(),
            "combined.csv",
            "year,region_type,region,occupation_code,occupation_title,major_group_name,employment,mean_annual_wage\n\
             2024,National,United States,11-0000,Management Occupations,Management,9270000,126480\n\
             2024,State,California,11-0000,Management Occupations,Management,1112400,135000\n\
             ,Metro,\"St. Louis, MO-IL\",11-0000,Management Occupations,Management,278100,110000\n\
             2024,County,Nowhere,11-0000,Management Occupations,Management,1,1\n",
        );

        let storage = Storage::open_in_memory().await.expect("open db");
        let outcome = import_combined(&storage, &path, 2024).await.expect("import");
        // The County row has an invalid region type and is dropped.
        assert_eq!(outcome.imported, 3);

        let records = storage.query_records(None).await.expect("query");
        assert_eq!(records.len(), 3);
        let metro = records
            .iter()
            .find(|r| r.region_type == RegionType::Metro)
            .expect("metro row");
        assert_eq!(metro.region, "St. Louis, MO-IL");
        assert_eq!(metro.year, 2024); // defaulted from the blank year cell
    }
}
