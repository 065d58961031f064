//! The export view builder: occupation records in, one structured
//! [`StaticView`] out.
//!
//! This is the single contract every export format derives from. Level
//! filtering is parameterized through [`LevelFilter`] so the main
//! (levels 1-2), level-extension, and unfiltered exports all share one
//! code path.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use jobatlas_shared::{MajorGroupTable, OccupationRecord, RegionType};

// ---------------------------------------------------------------------------
// Level filtering
// ---------------------------------------------------------------------------

/// Which occupation-code levels a view includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Every level.
    All,
    /// Levels up to and including `n`.
    Max(u8),
    /// Exactly level `n`.
    Exact(u8),
}

impl LevelFilter {
    /// Whether a record at `level` survives this filter.
    pub fn admits(&self, level: u8) -> bool {
        match *self {
            LevelFilter::All => true,
            LevelFilter::Max(max) => level <= max,
            LevelFilter::Exact(exact) => level == exact,
        }
    }
}

// ---------------------------------------------------------------------------
// View structure (the export contract)
// ---------------------------------------------------------------------------

/// File-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    /// ISO date the view was generated.
    pub last_updated: String,
    /// Years present, ascending.
    pub years: Vec<i32>,
    /// Human-readable data provenance.
    pub source: String,
    /// Set when the view was built with [`LevelFilter::Max`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u8>,
    /// Set when the view was built with [`LevelFilter::Exact`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// 2-letter country tag for country-scoped files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// One deduplicated region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    pub region_id: String,
    pub name: String,
    pub region_type: RegionType,
}

/// One deduplicated occupation with its computed level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationEntry {
    pub soc_code: String,
    pub name: String,
    pub level: u8,
    pub major_group_id: String,
    pub major_group_name: String,
}

/// One major group with its display color.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorGroupEntry {
    pub group_id: String,
    pub name: String,
    pub color: String,
}

/// One record in a region-year list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionYearRecord {
    pub soc_code: String,
    pub tot_emp: i64,
    pub gdp: i64,
    pub a_mean: i64,
    pub complexity: f64,
}

/// Cross-region aggregate for one occupation in one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationAggregate {
    pub total_employ: i64,
    /// Arithmetic mean wage across regions present, unweighted by
    /// employment.
    pub avg_wage: f64,
    /// Arithmetic mean complexity across regions present, unweighted.
    pub avg_complexity: f64,
}

/// Dataset-wide wage/complexity statistics for one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinMaxStats {
    pub min_wage: i64,
    pub max_wage: i64,
    pub median_wage: i64,
    pub min_complexity: f64,
    pub max_complexity: f64,
    pub median_complexity: f64,
}

/// Per-year aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearAggregate {
    pub by_occupation: BTreeMap<String, OccupationAggregate>,
    pub min_max_stats: MinMaxStats,
}

/// The structured view object handed to export formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticView {
    pub metadata: ViewMetadata,
    pub regions: Vec<RegionEntry>,
    pub occupations: Vec<OccupationEntry>,
    pub major_groups: Vec<MajorGroupEntry>,
    /// region slug -> year -> record list.
    pub region_data: BTreeMap<String, BTreeMap<String, Vec<RegionYearRecord>>>,
    /// year -> aggregates.
    pub aggregates: BTreeMap<String, YearAggregate>,
}

impl StaticView {
    /// Total region-records across all regions and years.
    pub fn record_count(&self) -> usize {
        self.region_data
            .values()
            .flat_map(|years| years.values())
            .map(Vec::len)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build a [`StaticView`] from occupation records.
///
/// Records are filtered by `filter`, then deduplicated into region,
/// occupation, and major-group lists, grouped into the region-data map,
/// and aggregated per year.
pub fn build_view(
    records: &[OccupationRecord],
    filter: LevelFilter,
    groups: &MajorGroupTable,
    last_updated: &str,
) -> StaticView {
    let filtered: Vec<&OccupationRecord> = records
        .iter()
        .filter(|r| filter.admits(r.level()))
        .collect();

    // Deduplicate regions, occupations, and major groups.
    let mut region_keys: BTreeMap<(&str, &str), (RegionType, String)> = BTreeMap::new();
    let mut occupations: BTreeMap<&str, &OccupationRecord> = BTreeMap::new();
    let mut group_names: BTreeMap<&str, &str> = BTreeMap::new();
    let mut years: BTreeSet<i32> = BTreeSet::new();

    for record in &filtered {
        region_keys
            .entry((record.region_type.as_str(), record.region.as_str()))
            .or_insert_with(|| (record.region_type, record.region_slug()));
        occupations
            .entry(record.occupation_code.as_str())
            .or_insert(*record);
        let group_id = record.major_group_id();
        if !group_id.is_empty() {
            group_names
                .entry(group_id)
                .or_insert(record.major_group_name.as_str());
        }
        years.insert(record.year);
    }

    let regions: Vec<RegionEntry> = region_keys
        .iter()
        .map(|((_, name), (region_type, slug))| RegionEntry {
            region_id: slug.clone(),
            name: (*name).to_owned(),
            region_type: *region_type,
        })
        .collect();

    let occupation_entries: Vec<OccupationEntry> = occupations
        .values()
        .map(|record| OccupationEntry {
            soc_code: record.occupation_code.clone(),
            name: record.occupation_title.clone(),
            level: record.level(),
            major_group_id: record.major_group_id().to_owned(),
            major_group_name: record.major_group_name.clone(),
        })
        .collect();

    let major_groups: Vec<MajorGroupEntry> = group_names
        .iter()
        .map(|(id, name)| MajorGroupEntry {
            group_id: (*id).to_owned(),
            name: (*name).to_owned(),
            color: groups.color(id).to_owned(),
        })
        .collect();

    // region slug -> year -> records
    let mut region_data: BTreeMap<String, BTreeMap<String, Vec<RegionYearRecord>>> =
        BTreeMap::new();
    for record in &filtered {
        region_data
            .entry(record.region_slug())
            .or_default()
            .entry(record.year.to_string())
            .or_default()
            .push(RegionYearRecord {
                soc_code: record.occupation_code.clone(),
                tot_emp: record.employment,
                gdp: record.gdp,
                a_mean: record.mean_annual_wage,
                complexity: record.complexity_score,
            });
    }

    let aggregates = build_aggregates(&filtered, &years);

    let metadata = ViewMetadata {
        last_updated: last_updated.to_owned(),
        years: years.into_iter().collect(),
        source: "BLS OES + O*NET".to_owned(),
        max_level: match filter {
            LevelFilter::Max(n) => Some(n),
            _ => None,
        },
        level: match filter {
            LevelFilter::Exact(n) => Some(n),
            _ => None,
        },
        country: None,
    };

    StaticView {
        metadata,
        regions,
        occupations: occupation_entries,
        major_groups,
        region_data,
        aggregates,
    }
}

fn build_aggregates(
    filtered: &[&OccupationRecord],
    years: &BTreeSet<i32>,
) -> BTreeMap<String, YearAggregate> {
    let mut aggregates = BTreeMap::new();

    for &year in years {
        let year_records: Vec<&&OccupationRecord> =
            filtered.iter().filter(|r| r.year == year).collect();

        let mut by_code: BTreeMap<&str, (i64, Vec<i64>, Vec<f64>)> = BTreeMap::new();
        let mut all_wages: Vec<i64> = Vec::new();
        let mut all_complexity: Vec<f64> = Vec::new();

        for record in &year_records {
            let entry = by_code
                .entry(record.occupation_code.as_str())
                .or_insert_with(|| (0, Vec::new(), Vec::new()));
            entry.0 += record.employment;
            entry.1.push(record.mean_annual_wage);
            entry.2.push(record.complexity_score);
            all_wages.push(record.mean_annual_wage);
            all_complexity.push(record.complexity_score);
        }

        let by_occupation: BTreeMap<String, OccupationAggregate> = by_code
            .into_iter()
            .map(|(code, (total_employ, wages, complexities))| {
                (
                    code.to_owned(),
                    OccupationAggregate {
                        total_employ,
                        avg_wage: mean_i64(&wages),
                        avg_complexity: mean_f64(&complexities),
                    },
                )
            })
            .collect();

        all_wages.sort_unstable();
        all_complexity.sort_by(f64::total_cmp);

        let min_max_stats = MinMaxStats {
            min_wage: all_wages.first().copied().unwrap_or(0),
            max_wage: all_wages.last().copied().unwrap_or(0),
            median_wage: lower_middle(&all_wages).copied().unwrap_or(0),
            min_complexity: all_complexity.first().copied().unwrap_or(0.0),
            max_complexity: all_complexity.last().copied().unwrap_or(1.0),
            median_complexity: lower_middle(&all_complexity).copied().unwrap_or(0.5),
        };

        aggregates.insert(
            year.to_string(),
            YearAggregate {
                by_occupation,
                min_max_stats,
            },
        );
    }

    aggregates
}

/// Median element of an ascending-sorted slice: the element at index
/// `len / 2`, with no interpolation for even lengths. This tie-break is
/// load-bearing for downstream consumers and must not be "fixed" to
/// `(a + b) / 2`.
fn lower_middle<T>(sorted: &[T]) -> Option<&T> {
    sorted.get(sorted.len() / 2)
}

fn mean_i64(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
