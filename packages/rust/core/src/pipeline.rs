//! End-to-end pipeline: reset → import → score → validate → export.
//!
//! One run owns the database for its duration. Scores are committed at
//! two checkpoints (GDP proxy, then survey overlay). Validation findings
//! and completeness warnings are collected and reported, never thrown;
//! only the explicit `validate` CLI step turns findings into a non-zero
//! exit.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use jobatlas_scoring::{ScoringMethod, compute_scores};
use jobatlas_shared::{MAJOR_GROUPS, Result};
use jobatlas_storage::Storage;

use crate::export::{self, ExportStats};
use crate::validate;

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Data year imported and exported.
    pub year: i32,
    /// 3-letter country code scoped by the export phase.
    pub country: String,
    /// Directory of input CSVs (national files, `states/`, `metros/`).
    pub data_dir: PathBuf,
    /// Directory the JSON exports are written to.
    pub export_dir: PathBuf,
    /// Drop and recreate all tables before importing.
    pub fresh: bool,
    /// Stop after import + scoring (skip export).
    pub import_only: bool,
    /// Skip import + scoring (export from existing data).
    pub export_only: bool,
    /// Combined CSV to import instead of walking the data directory.
    pub combined_csv: Option<PathBuf>,
    /// Survey task-ratings CSV for task-derived complexity.
    pub task_ratings_csv: Option<PathBuf>,
    /// Complexity scoring method for the survey path.
    pub scoring: ScoringMethod,
    /// Also write the flat research CSVs.
    pub export_csv: bool,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunResult {
    /// Occupation records written.
    pub imported: usize,
    /// Rows rejected for unknown code formats.
    pub rejected: usize,
    /// `(year, region)` partitions scored by the GDP proxy.
    pub partitions_scored: usize,
    /// Rows overwritten with survey-derived scores.
    pub task_scored_rows: u64,
    /// Database validation findings (non-fatal).
    pub findings: Vec<String>,
    /// Parent/child completeness warnings (informational).
    pub completeness_warnings: Vec<String>,
    /// Export statistics, when the export phase ran.
    pub export: Option<ExportStats>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run the pipeline against an open storage handle.
#[instrument(skip_all, fields(year = config.year, country = %config.country))]
pub async fn run(
    storage: &Storage,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let last_updated = chrono::Utc::now().format("%Y-%m-%d").to_string();

    let mut imported = 0;
    let mut rejected = 0;
    let mut partitions_scored = 0;
    let mut task_scored_rows = 0;

    if !config.export_only {
        if config.fresh {
            progress.phase("Resetting database");
            storage.reset().await?;
        }

        // --- Import phase ---
        progress.phase("Importing occupational data");
        let outcome = match &config.combined_csv {
            Some(path) if path.exists() => {
                jobatlas_ingest::import_combined(storage, path, config.year).await?
            }
            _ => jobatlas_ingest::import_all(storage, &config.data_dir, config.year).await?,
        };
        imported = outcome.imported;
        rejected = outcome.rejected;
        info!(imported, rejected, "import phase complete");

        // --- Scoring phase ---
        // The GDP proxy always runs first so every record carries a
        // score; survey-derived scores then overwrite the codes they
        // cover. One source wins outright per occupation, no blending.
        progress.phase("Computing complexity scores");
        partitions_scored = storage.compute_gdp_proxy_scores().await?;

        if let Some(ratings_path) = &config.task_ratings_csv {
            if ratings_path.exists() {
                let ratings = jobatlas_ingest::read_task_ratings(ratings_path)?;
                let scores = compute_scores(&ratings, config.scoring);
                if scores.is_empty() {
                    info!("no task-derived complexity available, keeping GDP proxy");
                } else {
                    task_scored_rows = storage.apply_task_scores(&scores).await?;
                }
            } else {
                info!(path = %ratings_path.display(), "task ratings file not found, keeping GDP proxy");
            }
        }
    }

    // --- Validation phase ---
    progress.phase("Validating database");
    let findings = validate::validate_storage(storage).await?;
    for finding in &findings {
        warn!(finding = %finding, "database validation");
    }

    let country_records = storage
        .query_records(Some(std::slice::from_ref(&config.country)))
        .await?;
    let year_records: Vec<_> = country_records
        .iter()
        .filter(|r| r.year == config.year)
        .cloned()
        .collect();

    let completeness = validate::completeness_warnings(&year_records);
    for warning in &completeness {
        warn!(warning = %warning, "completeness check");
    }

    // --- Export phase ---
    let mut export_stats = None;
    if !config.import_only {
        progress.phase("Exporting views");
        export_stats = Some(export::export_all(
            &country_records,
            &config.country,
            config.year,
            &config.export_dir,
            &MAJOR_GROUPS,
            &last_updated,
        )?);

        if config.export_csv {
            progress.phase("Exporting research CSVs");
            let all_records = storage.query_records(None).await?;
            let files = export::export_research_csvs(&all_records, &config.export_dir)?;
            for (file, rows) in files {
                info!(file = %file, rows, "wrote research CSV");
            }
        }
    }

    let result = RunResult {
        imported,
        rejected,
        partitions_scored,
        task_scored_rows,
        findings,
        completeness_warnings: completeness,
        export: export_stats,
        elapsed: start.elapsed(),
    };

    progress.done(&result);
    info!(
        imported = result.imported,
        partitions = result.partitions_scored,
        findings = result.findings.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "pipeline complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::export::{META_FILE_NAME, MetaCatalog};
    use crate::validate::validate_view_file;
    use crate::view::StaticView;

    /// The national seed set: one code per hierarchy branch, levels 1,
    /// 2, and 5, mirroring a thin slice of the real dataset.
    const SEED_OCCUPATIONS: [(&str, &str, &str, i64, i64); 7] = [
        ("11-0000", "Management Occupations", "Management", 9_270_000, 126_480),
        ("11-1000", "Top Executives", "Management", 3_000_000, 200_000),
        ("11-1011", "Chief Executives", "Management", 200_000, 200_000),
        ("15-1252", "Software Developers", "Computer and Mathematical", 1_500_000, 130_000),
        ("29-1141", "Registered Nurses", "Healthcare Practitioners and Technical", 3_000_000, 80_000),
        ("35-2014", "Cooks, Restaurant", "Food Preparation and Serving Related", 1_300_000, 32_000),
        ("53-3032", "Heavy Truck Drivers", "Transportation and Material Moving", 2_000_000, 50_000),
    ];

    /// Write a combined CSV seeding three regions: national, one state
    /// at 12% of national employment, one metro at 3%.
    fn write_seed_csv(dir: &Path) -> PathBuf {
        let mut content = String::from(
            "year,region_type,region,occupation_code,occupation_title,major_group_name,employment,mean_annual_wage\n",
        );
        for (region_type, region, scale) in [
            ("National", "United States", 1.0),
            ("State", "California", 0.12),
            ("Metro", "San Francisco-Oakland-Berkeley, CA", 0.03),
        ] {
            for (code, title, group, employment, wage) in SEED_OCCUPATIONS {
                let scaled = (employment as f64 * scale) as i64;
                content.push_str(&format!(
                    "2024,{region_type},\"{region}\",{code},\"{title}\",{group},{scaled},{wage}\n"
                ));
            }
        }
        let path = dir.join("combined.csv");
        std::fs::write(&path, content).expect("write seed csv");
        path
    }

    fn run_config(data_dir: &Path, export_dir: &Path, combined: PathBuf) -> RunConfig {
        RunConfig {
            year: 2024,
            country: "USA".into(),
            data_dir: data_dir.to_path_buf(),
            export_dir: export_dir.to_path_buf(),
            fresh: false,
            import_only: false,
            export_only: false,
            combined_csv: Some(combined),
            task_ratings_csv: None,
            scoring: ScoringMethod::Iterative,
            export_csv: false,
        }
    }

    #[tokio::test]
    async fn full_run_scores_and_exports() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let export_dir = tmp.path().join("export");
        let combined = write_seed_csv(tmp.path());
        let storage = Storage::open_in_memory().await.expect("open db");

        let config = run_config(tmp.path(), &export_dir, combined);
        let result = run(&storage, &config, &SilentProgress).await.expect("run");

        assert_eq!(result.imported, 21); // 7 occupations x 3 regions
        assert_eq!(result.rejected, 0);
        assert_eq!(result.partitions_scored, 3);
        assert!(result.findings.is_empty(), "findings: {:?}", result.findings);

        // Every region's minimum-GDP record scores 0.0 and maximum 1.0.
        let records = storage.query_records(None).await.expect("query");
        for region in ["United States", "California"] {
            let region_records: Vec<_> =
                records.iter().filter(|r| r.region == region).collect();
            assert_eq!(region_records.len(), 7);
            let min = region_records
                .iter()
                .min_by_key(|r| r.gdp)
                .expect("min record");
            let max = region_records
                .iter()
                .max_by_key(|r| r.gdp)
                .expect("max record");
            assert_eq!(min.complexity_score, 0.0);
            assert_eq!(max.complexity_score, 1.0);
            assert_eq!(max.occupation_code, "11-0000");
        }

        // Main export carries exactly the 2 occupations at levels 1-2.
        let main_path = export_dir.join("jobs-data-us-2024.json");
        let main: StaticView =
            serde_json::from_str(&std::fs::read_to_string(&main_path).expect("read main"))
                .expect("parse main");
        assert_eq!(main.occupations.len(), 2);
        assert_eq!(main.regions.len(), 3);
        assert!(validate_view_file(&main_path).is_empty());

        // The level-5 extension carries exactly the level-5 subset.
        let level5_path = export_dir.join("jobs-data-us-2024-5.json");
        let level5: StaticView =
            serde_json::from_str(&std::fs::read_to_string(&level5_path).expect("read level 5"))
                .expect("parse level 5");
        assert_eq!(level5.occupations.len(), 5);
        for occupation in &level5.occupations {
            assert_eq!(occupation.level, 5);
        }

        // Catalog lists exactly the written extensions (level 5 only).
        let meta: MetaCatalog = serde_json::from_str(
            &std::fs::read_to_string(export_dir.join(META_FILE_NAME)).expect("read meta"),
        )
        .expect("parse meta");
        let listed = &meta.level_files["us-2024"];
        assert_eq!(listed.keys().map(String::as_str).collect::<Vec<_>>(), vec!["5"]);

        let stats = result.export.expect("export stats");
        assert_eq!(stats.levels_in_data, vec![1, 2, 5]);
        assert_eq!(stats.main_records, 6); // 2 occupations x 3 regions
    }

    #[tokio::test]
    async fn import_only_skips_export() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let export_dir = tmp.path().join("export");
        let combined = write_seed_csv(tmp.path());
        let storage = Storage::open_in_memory().await.expect("open db");

        let mut config = run_config(tmp.path(), &export_dir, combined);
        config.import_only = true;
        let result = run(&storage, &config, &SilentProgress).await.expect("run");

        assert_eq!(result.imported, 21);
        assert!(result.export.is_none());
        assert!(!export_dir.exists());
    }

    #[tokio::test]
    async fn export_only_reuses_existing_data() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let export_dir = tmp.path().join("export");
        let combined = write_seed_csv(tmp.path());
        let storage = Storage::open_in_memory().await.expect("open db");

        let mut config = run_config(tmp.path(), &export_dir, combined.clone());
        config.import_only = true;
        run(&storage, &config, &SilentProgress).await.expect("seed run");

        let mut config = run_config(tmp.path(), &export_dir, combined);
        config.export_only = true;
        let result = run(&storage, &config, &SilentProgress).await.expect("export run");

        assert_eq!(result.imported, 0); // nothing re-imported
        assert!(result.export.is_some());
        assert!(export_dir.join("jobs-data-us-2024.json").exists());
    }

    #[tokio::test]
    async fn survey_scores_overlay_gdp_proxy() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let export_dir = tmp.path().join("export");
        let combined = write_seed_csv(tmp.path());

        // Task counts: 11-1011 gets 3 tasks, 15-1252 gets 1.
        let ratings_path = tmp.path().join("task_ratings.csv");
        std::fs::write(
            &ratings_path,
            "occupation_code,task_id,scale_id,data_value,recommend_suppress\n\
             11-1011.00,1,IM,4.5,\n\
             11-1011.00,2,IM,4.0,\n\
             11-1011.00,3,IM,3.5,\n\
             15-1252.00,9,IM,4.1,\n",
        )
        .expect("write ratings");

        let storage = Storage::open_in_memory().await.expect("open db");
        let mut config = run_config(tmp.path(), &export_dir, combined);
        config.task_ratings_csv = Some(ratings_path);
        config.scoring = ScoringMethod::TaskCount;
        let result = run(&storage, &config, &SilentProgress).await.expect("run");

        // Two codes x three regions overwritten.
        assert_eq!(result.task_scored_rows, 6);

        let records = storage.query_records(None).await.expect("query");
        for record in records {
            match record.occupation_code.as_str() {
                "11-1011" => assert_eq!(record.complexity_score, 1.0),
                "15-1252" => assert_eq!(record.complexity_score, 0.0),
                _ => {}
            }
        }
    }
}
