//! Region types and slug identity.
//!
//! A region slug is the stable join key between independently generated
//! files, so the algorithm here must never change for a given
//! `(type, name)` pair.

use serde::{Deserialize, Serialize};

use crate::error::{JobAtlasError, Result};

/// Geographic granularity of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegionType {
    National,
    State,
    Metro,
}

impl RegionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::National => "National",
            RegionType::State => "State",
            RegionType::Metro => "Metro",
        }
    }
}

impl std::fmt::Display for RegionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RegionType {
    type Err = JobAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "National" => Ok(RegionType::National),
            "State" => Ok(RegionType::State),
            "Metro" => Ok(RegionType::Metro),
            other => Err(JobAtlasError::validation(format!(
                "invalid region type: {other}"
            ))),
        }
    }
}

/// Generate a URL-safe slug from region type and name.
///
/// Metro names truncate to the first city (before the first `-` or `,`),
/// dropping the state suffix. Spaces map to underscores, periods are
/// removed, and anything outside `[a-z0-9_]` is stripped.
///
/// Examples:
/// - `(National, "United States")` -> `national-united_states`
/// - `(State, "New York")` -> `state-new_york`
/// - `(Metro, "St. Louis, MO-IL")` -> `metro-st_louis`
pub fn region_slug(region_type: RegionType, region_name: &str) -> String {
    let base = match region_type {
        RegionType::Metro => region_name
            .split(['-', ','])
            .next()
            .unwrap_or(region_name)
            .trim(),
        _ => region_name,
    };

    let mut slug = String::with_capacity(base.len());
    for ch in base.to_lowercase().chars() {
        match ch {
            ' ' => slug.push('_'),
            '.' => {}
            c if c.is_ascii_alphanumeric() || c == '_' => slug.push(c),
            _ => {}
        }
    }

    format!("{}-{slug}", region_type.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_type_roundtrip() {
        for rt in [RegionType::National, RegionType::State, RegionType::Metro] {
            let parsed: RegionType = rt.as_str().parse().expect("parse region type");
            assert_eq!(parsed, rt);
        }
    }

    #[test]
    fn invalid_region_type_rejected() {
        let result = "County".parse::<RegionType>();
        assert!(result.is_err());
    }

    #[test]
    fn slug_generation() {
        assert_eq!(
            region_slug(RegionType::State, "California"),
            "state-california"
        );
        assert_eq!(region_slug(RegionType::State, "New York"), "state-new_york");
        assert_eq!(
            region_slug(RegionType::National, "United States"),
            "national-united_states"
        );
        assert_eq!(
            region_slug(RegionType::Metro, "Atlanta-Sandy Springs-Alpharetta, GA"),
            "metro-atlanta"
        );
        assert_eq!(
            region_slug(RegionType::Metro, "St. Louis, MO-IL"),
            "metro-st_louis"
        );
        assert_eq!(
            region_slug(RegionType::Metro, "Minneapolis-St. Paul-Bloomington, MN-WI"),
            "metro-minneapolis"
        );
    }

    #[test]
    fn slug_is_stable_across_calls() {
        let a = region_slug(RegionType::Metro, "San Francisco-Oakland-Berkeley, CA");
        let b = region_slug(RegionType::Metro, "San Francisco-Oakland-Berkeley, CA");
        assert_eq!(a, b);
        assert_eq!(a, "metro-san_francisco");
    }
}
