//! libSQL storage layer for occupational data.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! country/region/occupation row-store. The pipeline is the sole writer;
//! a run owns the database for its duration and commits at defined
//! checkpoints (after import, after complexity computation).
//!
//! Score recomputation is transactional per step: either every
//! `(year, region)` partition's scores are rewritten and committed, or
//! the prior state is left untouched.

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use libsql::{Connection, Database, params};

use jobatlas_shared::{
    CodeSystem, JobAtlasError, OccupationInput, OccupationRecord, RegionType, Result,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// One row of the per-country/region-type record count summary.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub country_code: String,
    pub country_name: String,
    pub region_type: RegionType,
    pub record_count: i64,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| JobAtlasError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a throwaway in-memory database (tests, dry runs).
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    JobAtlasError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Drop all tables and re-apply migrations (for `--fresh` rebuilds).
    pub async fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "DROP TABLE IF EXISTS occupations;
                 DROP TABLE IF EXISTS regions;
                 DROP TABLE IF EXISTS countries;
                 DROP TABLE IF EXISTS schema_migrations;",
            )
            .await
            .map_err(storage_err)?;
        self.run_migrations().await
    }

    // -----------------------------------------------------------------------
    // Country and region operations
    // -----------------------------------------------------------------------

    /// Insert a country if not present; return its id either way.
    pub async fn ensure_country(
        &self,
        code: &str,
        name: &str,
        code_system: CodeSystem,
        currency: &str,
    ) -> Result<i64> {
        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO countries (code, name, code_system, currency)
                 VALUES (?1, ?2, ?3, ?4)",
                params![code, name, code_system.as_str(), currency],
            )
            .await
            .map_err(storage_err)?;

        if affected > 0 {
            return Ok(self.conn.last_insert_rowid());
        }

        let mut rows = self
            .conn
            .query("SELECT id FROM countries WHERE code = ?1", params![code])
            .await
            .map_err(storage_err)?;
        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).map_err(storage_err),
            _ => Err(JobAtlasError::Storage(format!(
                "country {code} missing after insert"
            ))),
        }
    }

    /// Insert a region if not present; return its id either way.
    pub async fn ensure_region(
        &self,
        country_id: i64,
        name: &str,
        region_type: RegionType,
    ) -> Result<i64> {
        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO regions (country_id, name, region_type)
                 VALUES (?1, ?2, ?3)",
                params![country_id, name, region_type.as_str()],
            )
            .await
            .map_err(storage_err)?;

        if affected > 0 {
            return Ok(self.conn.last_insert_rowid());
        }

        let mut rows = self
            .conn
            .query(
                "SELECT id FROM regions
                 WHERE country_id = ?1 AND name = ?2 AND region_type = ?3",
                params![country_id, name, region_type.as_str()],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).map_err(storage_err),
            _ => Err(JobAtlasError::Storage(format!(
                "region {name} missing after insert"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Occupation operations
    // -----------------------------------------------------------------------

    /// Upsert one occupation record keyed by `(year, region, code)`.
    ///
    /// GDP is derived here and only here; the column cannot drift from
    /// `employment * mean_annual_wage`. The score starts at the neutral
    /// 0.5 until a compute pass overwrites it.
    pub async fn upsert_occupation(
        &self,
        year: i32,
        region_id: i64,
        input: &OccupationInput,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO occupations
                 (year, region_id, occupation_code, occupation_title,
                  major_group_name, employment, mean_annual_wage, gdp, complexity_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0.5)",
                params![
                    year as i64,
                    region_id,
                    input.occupation_code.as_str(),
                    input.occupation_title.as_str(),
                    input.major_group_name.as_str(),
                    input.employment,
                    input.mean_annual_wage,
                    input.gdp(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Set `complexity_score` to min-max normalized GDP per
    /// `(year, region)` partition.
    ///
    /// Per-region normalization gives each treemap view the full 0-1
    /// color range. A partition whose GDPs are all equal gets 0.5
    /// throughout. The whole pass runs in one transaction and fully
    /// overwrites prior scores, so re-running on unchanged data is
    /// idempotent. Returns the number of partitions updated.
    pub async fn compute_gdp_proxy_scores(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT year, region_id, MIN(gdp), MAX(gdp)
                 FROM occupations
                 GROUP BY year, region_id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut partitions: Vec<(i64, i64, i64, i64)> = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            partitions.push((
                row.get::<i64>(0).map_err(storage_err)?,
                row.get::<i64>(1).map_err(storage_err)?,
                row.get::<i64>(2).map_err(storage_err)?,
                row.get::<i64>(3).map_err(storage_err)?,
            ));
        }

        self.conn
            .execute("BEGIN IMMEDIATE", params![])
            .await
            .map_err(storage_err)?;

        match self.write_proxy_partitions(&partitions).await {
            Ok(()) => {
                self.conn
                    .execute("COMMIT", params![])
                    .await
                    .map_err(storage_err)?;
                tracing::info!(partitions = partitions.len(), "GDP-proxy scores committed");
                Ok(partitions.len())
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", params![]).await;
                Err(e)
            }
        }
    }

    async fn write_proxy_partitions(&self, partitions: &[(i64, i64, i64, i64)]) -> Result<()> {
        for &(year, region_id, min_gdp, max_gdp) in partitions {
            let range = max_gdp - min_gdp;
            if range == 0 {
                self.conn
                    .execute(
                        "UPDATE occupations SET complexity_score = 0.5
                         WHERE year = ?1 AND region_id = ?2",
                        params![year, region_id],
                    )
                    .await
                    .map_err(storage_err)?;
            } else {
                self.conn
                    .execute(
                        "UPDATE occupations SET complexity_score =
                         ROUND(CAST(gdp - ?1 AS REAL) / ?2, 4)
                         WHERE year = ?3 AND region_id = ?4",
                        params![min_gdp, range, year, region_id],
                    )
                    .await
                    .map_err(storage_err)?;
            }
        }
        Ok(())
    }

    /// Overwrite `complexity_score` for every record whose occupation
    /// code appears in a survey-derived score mapping.
    ///
    /// Codes absent from the mapping keep their GDP-proxy score; the two
    /// sources are never blended. The update is transactional. Returns
    /// the number of rows rewritten.
    pub async fn apply_task_scores(&self, scores: &BTreeMap<String, f64>) -> Result<u64> {
        if scores.is_empty() {
            return Ok(0);
        }

        self.conn
            .execute("BEGIN IMMEDIATE", params![])
            .await
            .map_err(storage_err)?;

        let mut updated = 0u64;
        for (code, score) in scores {
            let result = self
                .conn
                .execute(
                    "UPDATE occupations SET complexity_score = ?1
                     WHERE occupation_code = ?2",
                    params![*score, code.as_str()],
                )
                .await;
            match result {
                Ok(affected) => updated += affected,
                Err(e) => {
                    let _ = self.conn.execute("ROLLBACK", params![]).await;
                    return Err(storage_err(e));
                }
            }
        }

        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(storage_err)?;
        tracing::info!(codes = scores.len(), rows = updated, "task-derived scores committed");
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All occupation records joined with their region and country,
    /// optionally filtered to a country-code set, ordered by
    /// `region_type, region_name, occupation_code`.
    pub async fn query_records(
        &self,
        country_codes: Option<&[String]>,
    ) -> Result<Vec<OccupationRecord>> {
        let mut sql = String::from(
            "SELECT o.year, r.region_type, r.name, o.occupation_code,
                    o.occupation_title, o.major_group_name, o.employment,
                    o.mean_annual_wage, o.gdp, o.complexity_score, c.code
             FROM occupations o
             JOIN regions r ON o.region_id = r.id
             JOIN countries c ON r.country_id = c.id",
        );

        let mut values: Vec<libsql::Value> = Vec::new();
        if let Some(codes) = country_codes {
            let placeholders: Vec<String> =
                (1..=codes.len()).map(|i| format!("?{i}")).collect();
            sql.push_str(&format!(" WHERE c.code IN ({})", placeholders.join(",")));
            values.extend(codes.iter().map(|c| libsql::Value::from(c.clone())));
        }
        sql.push_str(" ORDER BY r.region_type, r.name, o.occupation_code");

        let mut rows = self.conn.query(&sql, values).await.map_err(storage_err)?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    /// Total number of occupation records.
    pub async fn record_count(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM occupations", params![])
            .await
            .map_err(storage_err)?;
        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).map_err(storage_err),
            _ => Ok(0),
        }
    }

    /// Record counts grouped by country and region type.
    pub async fn summary(&self) -> Result<Vec<SummaryRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.code, c.name, r.region_type, COUNT(o.id)
                 FROM occupations o
                 JOIN regions r ON o.region_id = r.id
                 JOIN countries c ON r.country_id = c.id
                 GROUP BY c.code, r.region_type
                 ORDER BY c.code, r.region_type",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let region_type: String = row.get(2).map_err(storage_err)?;
            results.push(SummaryRow {
                country_code: row.get(0).map_err(storage_err)?,
                country_name: row.get(1).map_err(storage_err)?,
                region_type: region_type.parse()?,
                record_count: row.get(3).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Distinct raw `region_type` strings present in the regions table.
    ///
    /// Returned unparsed so validation can report an unknown type as a
    /// finding instead of failing the query that would join on it.
    pub async fn region_types(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT DISTINCT region_type FROM regions", params![])
            .await
            .map_err(storage_err)?;
        let mut types = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            types.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(types)
    }

    /// Number of `(year, region, code)` key groups holding more than one
    /// row. The schema's UNIQUE constraint should keep this at zero; the
    /// check exists so validation can report drift instead of trusting it.
    pub async fn duplicate_key_count(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM (
                     SELECT 1 FROM occupations
                     GROUP BY year, region_id, occupation_code
                     HAVING COUNT(*) > 1
                 )",
                params![],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).map_err(storage_err),
            _ => Ok(0),
        }
    }
}

fn storage_err(e: libsql::Error) -> JobAtlasError {
    JobAtlasError::Storage(e.to_string())
}

/// Convert a joined query row to an [`OccupationRecord`].
fn row_to_record(row: &libsql::Row) -> Result<OccupationRecord> {
    let region_type: String = row.get(1).map_err(storage_err)?;
    Ok(OccupationRecord {
        year: row.get::<i64>(0).map_err(storage_err)? as i32,
        region_type: region_type.parse()?,
        region: row.get(2).map_err(storage_err)?,
        occupation_code: row.get(3).map_err(storage_err)?,
        occupation_title: row.get(4).map_err(storage_err)?,
        major_group_name: row.get(5).map_err(storage_err)?,
        employment: row.get(6).map_err(storage_err)?,
        mean_annual_wage: row.get(7).map_err(storage_err)?,
        gdp: row.get(8).map_err(storage_err)?,
        complexity_score: row.get(9).map_err(storage_err)?,
        country_code: row.get(10).map_err(storage_err)?,
    })
}
