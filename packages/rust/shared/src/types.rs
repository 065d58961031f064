//! Core domain types for occupational data.

use serde::{Deserialize, Serialize};

use crate::codes;
use crate::region::{RegionType, region_slug};

/// A parsed occupation row headed for storage.
///
/// GDP is not a field: it is always derived as `employment * wage` at
/// insert time, which keeps `gdp == employment * mean_annual_wage` true
/// for every stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationInput {
    pub occupation_code: String,
    pub occupation_title: String,
    pub major_group_name: String,
    pub employment: i64,
    pub mean_annual_wage: i64,
}

impl OccupationInput {
    /// Derived GDP contribution of this occupation.
    pub fn gdp(&self) -> i64 {
        self.employment * self.mean_annual_wage
    }
}

/// A fully joined occupation record as read back from storage.
///
/// Uniquely keyed by `(year, region, occupation_code)` within a country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupationRecord {
    pub year: i32,
    pub region_type: RegionType,
    pub region: String,
    pub country_code: String,
    pub occupation_code: String,
    pub occupation_title: String,
    pub major_group_name: String,
    pub employment: i64,
    pub mean_annual_wage: i64,
    pub gdp: i64,
    pub complexity_score: f64,
}

impl OccupationRecord {
    /// Hierarchy level of this record's occupation code.
    pub fn level(&self) -> u8 {
        codes::code_level(&self.occupation_code)
    }

    /// 2-digit major-group id (empty for ISCO codes).
    pub fn major_group_id(&self) -> &str {
        codes::major_group_id(&self.occupation_code)
    }

    /// Stable region identity for this record.
    pub fn region_slug(&self) -> String {
        region_slug(self.region_type, &self.region)
    }
}

/// One raw survey task-rating row, as delivered by the ingestion
/// collaborator.
///
/// `data_value` is `None` when the source cell was missing or
/// non-numeric; such rows are dropped by the scoring filter rather than
/// erroring the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRating {
    pub occupation_code: String,
    pub task_id: String,
    pub scale_id: String,
    pub data_value: Option<f64>,
    pub suppress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gdp_is_derived() {
        let input = OccupationInput {
            occupation_code: "11-0000".into(),
            occupation_title: "Management Occupations".into(),
            major_group_name: "Management".into(),
            employment: 9270,
            mean_annual_wage: 126_480,
        };
        assert_eq!(input.gdp(), 9270 * 126_480);
    }

    #[test]
    fn record_helpers() {
        let record = OccupationRecord {
            year: 2024,
            region_type: RegionType::State,
            region: "New York".into(),
            country_code: "USA".into(),
            occupation_code: "11-1011".into(),
            occupation_title: "Chief Executives".into(),
            major_group_name: "Management".into(),
            employment: 200_000,
            mean_annual_wage: 200_000,
            gdp: 200_000i64 * 200_000,
            complexity_score: 0.5,
        };
        assert_eq!(record.level(), 5);
        assert_eq!(record.major_group_id(), "11");
        assert_eq!(record.region_slug(), "state-new_york");
    }
}
