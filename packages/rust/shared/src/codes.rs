//! Occupation code handling: code-system detection, hierarchy levels,
//! parent derivation, and major-group lookup.
//!
//! Two code systems are supported:
//! - SOC: `XX-XXXX` (2-digit major group, dash, 4-digit detail)
//! - ISCO: `OCn` single-digit group codes
//!
//! The SOC detail digits encode a 5-level hierarchy by trailing zeros:
//! `11-0000` is the level-1 major group, `11-1011` a level-5 detailed
//! occupation.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::MajorGroupTable;
use crate::error::{JobAtlasError, Result};

// ---------------------------------------------------------------------------
// Code patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches SOC codes like `11-0000` or `15-1252`.
static SOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}-\d{4}$").expect("SOC regex")
});

/// Matches ISCO group codes like `OC1` or `OC9`.
static ISCO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^OC\d$").expect("ISCO regex")
});

// ---------------------------------------------------------------------------
// Code systems
// ---------------------------------------------------------------------------

/// The occupation-code system a country reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CodeSystem {
    /// US Standard Occupational Classification (`XX-XXXX`).
    Soc,
    /// International Standard Classification of Occupations (`OCn`).
    Isco,
}

impl CodeSystem {
    /// Detect the code system for an occupation code.
    ///
    /// Codes matching neither format are an error: the caller decides
    /// whether to skip the record or abort the import.
    pub fn detect(code: &str) -> Result<CodeSystem> {
        if SOC_RE.is_match(code) {
            Ok(CodeSystem::Soc)
        } else if ISCO_RE.is_match(code) {
            Ok(CodeSystem::Isco)
        } else {
            Err(JobAtlasError::validation(format!(
                "unknown occupation code format: {code}"
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeSystem::Soc => "SOC",
            CodeSystem::Isco => "ISCO",
        }
    }
}

impl std::fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CodeSystem {
    type Err = JobAtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SOC" => Ok(CodeSystem::Soc),
            "ISCO" => Ok(CodeSystem::Isco),
            other => Err(JobAtlasError::validation(format!(
                "unknown code system: {other}"
            ))),
        }
    }
}

/// True if `code` is a well-formed 7-character SOC code.
pub fn is_soc_code(code: &str) -> bool {
    SOC_RE.is_match(code)
}

// ---------------------------------------------------------------------------
// Hierarchy levels
// ---------------------------------------------------------------------------

/// Hierarchy level of an occupation code, from the trailing-zero run.
///
/// - `XX-0000` = 1 (major group)
/// - `XX-X000` = 2 (minor group)
/// - `XX-XX00` = 3 (broad occupation)
/// - `XX-XXX0` = 4 (detailed)
/// - `XX-XXXX` = 5 (most detailed)
///
/// Codes without trailing zeros (ISCO included) classify as level 5.
pub fn code_level(code: &str) -> u8 {
    if code.ends_with("-0000") {
        1
    } else if code.ends_with("000") {
        2
    } else if code.ends_with("00") {
        3
    } else if code.ends_with('0') {
        4
    } else {
        5
    }
}

/// Parent of a SOC code: zero its least significant non-zero digit.
///
/// `11-1011` -> `11-1010`, `11-1000` -> `11-0000`. Level-1 codes and
/// non-SOC codes have no parent.
pub fn parent_code(code: &str) -> Option<String> {
    if !is_soc_code(code) {
        return None;
    }
    let mut chars: Vec<char> = code.chars().collect();
    // Detail digits sit at positions 3..7, after "XX-".
    for i in (3..7).rev() {
        if chars[i] != '0' {
            chars[i] = '0';
            return Some(chars.into_iter().collect());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Major groups
// ---------------------------------------------------------------------------

/// Derive the major-group display name for an occupation.
///
/// SOC codes look up their 2-digit prefix in the group table, falling
/// back to the occupation title. For ISCO the title *is* the group name.
pub fn derive_major_group(
    code: &str,
    title: &str,
    system: CodeSystem,
    groups: &MajorGroupTable,
) -> String {
    match system {
        CodeSystem::Soc => {
            let prefix = &code[..code.len().min(2)];
            groups
                .name(prefix)
                .map(str::to_owned)
                .unwrap_or_else(|| title.to_owned())
        }
        CodeSystem::Isco => title.to_owned(),
    }
}

/// Major-group id for a code: the 2-digit SOC prefix, or empty for
/// dashless (ISCO) codes.
pub fn major_group_id(code: &str) -> &str {
    if code.contains('-') { &code[..2] } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAJOR_GROUPS;

    #[test]
    fn soc_detection() {
        assert_eq!(CodeSystem::detect("11-0000").expect("soc"), CodeSystem::Soc);
        assert_eq!(CodeSystem::detect("53-7062").expect("soc"), CodeSystem::Soc);
    }

    #[test]
    fn isco_detection() {
        assert_eq!(CodeSystem::detect("OC1").expect("isco"), CodeSystem::Isco);
        assert_eq!(CodeSystem::detect("OC9").expect("isco"), CodeSystem::Isco);
    }

    #[test]
    fn unknown_code_rejected() {
        assert!(CodeSystem::detect("INVALID").is_err());
        assert!(CodeSystem::detect("11-00001").is_err());
        assert!(CodeSystem::detect("").is_err());
    }

    #[test]
    fn level_classification() {
        assert_eq!(code_level("11-0000"), 1);
        assert_eq!(code_level("11-1000"), 2);
        assert_eq!(code_level("11-1100"), 3);
        assert_eq!(code_level("11-1110"), 4);
        assert_eq!(code_level("11-1011"), 5);
    }

    #[test]
    fn isco_codes_are_most_detailed() {
        assert_eq!(code_level("OC1"), 5);
    }

    #[test]
    fn parent_chain() {
        assert_eq!(parent_code("11-1011").as_deref(), Some("11-1010"));
        assert_eq!(parent_code("11-1010").as_deref(), Some("11-1000"));
        assert_eq!(parent_code("11-1000").as_deref(), Some("11-0000"));
        assert_eq!(parent_code("11-0000"), None);
        assert_eq!(parent_code("OC1"), None);
    }

    #[test]
    fn soc_major_group_lookup() {
        let name = derive_major_group("15-1234", "Software Dev", CodeSystem::Soc, &MAJOR_GROUPS);
        assert_eq!(name, "Computer and Mathematical");
    }

    #[test]
    fn soc_unknown_prefix_falls_back_to_title() {
        let name = derive_major_group("99-0000", "Mystery", CodeSystem::Soc, &MAJOR_GROUPS);
        assert_eq!(name, "Mystery");
    }

    #[test]
    fn isco_uses_title() {
        let name = derive_major_group("OC1", "Managers", CodeSystem::Isco, &MAJOR_GROUPS);
        assert_eq!(name, "Managers");
    }

    #[test]
    fn major_group_id_prefix() {
        assert_eq!(major_group_id("11-1011"), "11");
        assert_eq!(major_group_id("OC1"), "");
    }
}
