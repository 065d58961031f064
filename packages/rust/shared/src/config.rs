//! Application configuration and static domain registries.
//!
//! User config lives at `~/.jobatlas/jobatlas.toml`; CLI flags override
//! config file values, which override defaults.
//!
//! The country registry, major-group table, and metro mappings are
//! immutable process-wide data: constructed once, passed by reference,
//! never mutated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codes::CodeSystem;
use crate::error::{JobAtlasError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobatlas.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobatlas";

// ---------------------------------------------------------------------------
// Config structs (matching jobatlas.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Pipeline defaults.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Upstream source locations for the fetch step.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory holding input CSVs (`states/`, `metros/`, raw cache).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// SQLite database path.
    #[serde(default = "default_database")]
    pub database: String,

    /// Directory the JSON/CSV exports are written to.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_database(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_database() -> String {
    "data/jobatlas.db".into()
}
fn default_export_dir() -> String {
    "public/data".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default data year.
    #[serde(default = "default_year")]
    pub year: i32,

    /// Default country code (3-letter) for imports and exports.
    #[serde(default = "default_country")]
    pub country: String,

    /// Complexity scoring method: "iterative" or "task-count".
    #[serde(default = "default_scoring")]
    pub scoring: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            country: default_country(),
            scoring: default_scoring(),
        }
    }
}

fn default_year() -> i32 {
    2024
}
fn default_country() -> String {
    "USA".into()
}
fn default_scoring() -> String {
    "iterative".into()
}

/// `[sources]` section. Empty URLs disable the corresponding fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// URL of the combined occupational-data CSV.
    #[serde(default)]
    pub occupational_data_url: String,

    /// URL of the survey task-ratings CSV.
    #[serde(default)]
    pub task_ratings_url: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobatlas/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| JobAtlasError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobatlas/jobatlas.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobAtlasError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        JobAtlasError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobAtlasError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JobAtlasError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobAtlasError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Country registry
// ---------------------------------------------------------------------------

/// Static description of a supported country.
#[derive(Debug, Clone, Copy)]
pub struct CountrySpec {
    /// 3-letter country code.
    pub code: &'static str,
    pub name: &'static str,
    pub code_system: CodeSystem,
    pub currency: &'static str,
    /// Display name of the country-wide region.
    pub national_region_name: &'static str,
    /// File name of the national-level CSV under the data directory.
    pub national_csv: &'static str,
    /// Subdirectory of per-state CSVs, for countries that report them.
    pub states_dir: Option<&'static str>,
}

/// All supported countries.
pub static COUNTRIES: &[CountrySpec] = &[
    CountrySpec {
        code: "USA",
        name: "United States",
        code_system: CodeSystem::Soc,
        currency: "USD",
        national_region_name: "United States",
        national_csv: "us_occupational_data.csv",
        states_dir: Some("states"),
    },
    CountrySpec {
        code: "GBR",
        name: "United Kingdom",
        code_system: CodeSystem::Isco,
        currency: "GBP",
        national_region_name: "United Kingdom",
        national_csv: "gbr_occupational_data.csv",
        states_dir: None,
    },
    CountrySpec {
        code: "IND",
        name: "India",
        code_system: CodeSystem::Isco,
        currency: "INR",
        national_region_name: "India",
        national_csv: "ind_occupational_data.csv",
        states_dir: None,
    },
    CountrySpec {
        code: "EGY",
        name: "Egypt",
        code_system: CodeSystem::Isco,
        currency: "EGP",
        national_region_name: "Egypt",
        national_csv: "egy_occupational_data.csv",
        states_dir: None,
    },
    CountrySpec {
        code: "CAN",
        name: "Canada",
        code_system: CodeSystem::Isco,
        currency: "CAD",
        national_region_name: "Canada",
        national_csv: "can_occupational_data.csv",
        states_dir: None,
    },
    CountrySpec {
        code: "MEX",
        name: "Mexico",
        code_system: CodeSystem::Isco,
        currency: "MXN",
        national_region_name: "Mexico",
        national_csv: "mex_occupational_data.csv",
        states_dir: None,
    },
    CountrySpec {
        code: "EUU",
        name: "European Union",
        code_system: CodeSystem::Isco,
        currency: "EUR",
        national_region_name: "European Union",
        national_csv: "eu_occupational_data.csv",
        states_dir: None,
    },
];

/// Look up a country by its 3-letter code.
pub fn country(code: &str) -> Option<&'static CountrySpec> {
    COUNTRIES.iter().find(|c| c.code == code)
}

/// Convert a 3-letter country code to its 2-letter short form
/// (`USA` -> `us`), used in export file names.
pub fn country_short(code: &str) -> String {
    match code {
        "USA" => "us".into(),
        "GBR" => "gb".into(),
        "IND" => "in".into(),
        "EGY" => "eg".into(),
        "CAN" => "ca".into(),
        "MEX" => "mx".into(),
        "EUU" => "eu".into(),
        other => other.to_lowercase().chars().take(2).collect(),
    }
}

/// Resolve a 2-letter short form back to the 3-letter code, defaulting
/// to USA for unknown input.
pub fn country_for_short(short: &str) -> &'static str {
    COUNTRIES
        .iter()
        .find(|c| country_short(c.code) == short.to_lowercase())
        .map(|c| c.code)
        .unwrap_or("USA")
}

// ---------------------------------------------------------------------------
// Major groups
// ---------------------------------------------------------------------------

/// Immutable major-group lookup table: 2-digit SOC prefix to display
/// name and visualization color.
#[derive(Debug)]
pub struct MajorGroupTable {
    entries: &'static [(&'static str, &'static str, &'static str)],
}

/// Fallback color for prefixes missing from the table.
const DEFAULT_GROUP_COLOR: &str = "#999999";

impl MajorGroupTable {
    /// Display name for a 2-digit group id.
    pub fn name(&self, group_id: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(id, _, _)| *id == group_id)
            .map(|(_, name, _)| *name)
    }

    /// Visualization color for a 2-digit group id.
    pub fn color(&self, group_id: &str) -> &'static str {
        self.entries
            .iter()
            .find(|(id, _, _)| *id == group_id)
            .map(|(_, _, color)| *color)
            .unwrap_or(DEFAULT_GROUP_COLOR)
    }

    /// All `(id, name, color)` entries in table order.
    pub fn entries(&self) -> &'static [(&'static str, &'static str, &'static str)] {
        self.entries
    }
}

/// SOC major groups (US BLS) with frontend colors.
pub static MAJOR_GROUPS: MajorGroupTable = MajorGroupTable {
    entries: &[
        ("11", "Management", "#A973BE"),
        ("13", "Business and Financial Operations", "#F1866C"),
        ("15", "Computer and Mathematical", "#488098"),
        ("17", "Architecture and Engineering", "#6A6AAD"),
        ("19", "Life, Physical, and Social Science", "#77C898"),
        ("21", "Community and Social Service", "#93CFD0"),
        ("23", "Legal", "#D35162"),
        ("25", "Educational Instruction and Library", "#FFC135"),
        ("27", "Arts, Design, Entertainment, Sports, and Media", "#F28188"),
        ("29", "Healthcare Practitioners and Technical", "#5B9BD5"),
        ("31", "Healthcare Support", "#70AD47"),
        ("33", "Protective Service", "#BF8F00"),
        ("35", "Food Preparation and Serving Related", "#ED7D31"),
        ("37", "Building and Grounds Cleaning and Maintenance", "#8DB4E2"),
        ("39", "Personal Care and Service", "#C5B0D5"),
        ("41", "Sales and Related", "#FF6B6B"),
        ("43", "Office and Administrative Support", "#4ECDC4"),
        ("45", "Farming, Fishing, and Forestry", "#556B2F"),
        ("47", "Construction and Extraction", "#DAA520"),
        ("49", "Installation, Maintenance, and Repair", "#708090"),
        ("51", "Production", "#CD853F"),
        ("53", "Transportation and Material Moving", "#9370DB"),
    ],
};

// ---------------------------------------------------------------------------
// Metro and state mappings
// ---------------------------------------------------------------------------

/// Metro CSV file stems mapped to country codes. US metros are not
/// listed; any stem not found here defaults to USA.
static METRO_COUNTRY_MAP: &[(&str, &str)] = &[
    ("london", "GBR"),
    ("paris", "EUU"),
    ("berlin", "EUU"),
    ("madrid", "EUU"),
    ("rome", "EUU"),
    ("toronto", "CAN"),
    ("montreal", "CAN"),
    ("vancouver", "CAN"),
    ("mexico_city", "MEX"),
    ("guadalajara", "MEX"),
    ("monterrey", "MEX"),
    ("mumbai", "IND"),
    ("delhi", "IND"),
    ("bangalore", "IND"),
    ("cairo", "EGY"),
    ("alexandria", "EGY"),
];

/// Metro stems needing an explicit display name (state suffixes,
/// punctuation). Stems not listed fall back to title-casing.
static METRO_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("new_york_newark_jersey_city", "New York-Newark-Jersey City, NY-NJ-PA"),
    ("los_angeles_long_beach_anaheim", "Los Angeles-Long Beach-Anaheim, CA"),
    ("chicago_naperville_elgin", "Chicago-Naperville-Elgin, IL-IN-WI"),
    ("dallas_fort_worth_arlington", "Dallas-Fort Worth-Arlington, TX"),
    ("houston_the_woodlands_sugar_land", "Houston-The Woodlands-Sugar Land, TX"),
    ("washington_arlington_alexandria", "Washington-Arlington-Alexandria, DC-VA-MD-WV"),
    ("miami_fort_lauderdale_pompano_beach", "Miami-Fort Lauderdale-Pompano Beach, FL"),
    ("philadelphia_camden_wilmington", "Philadelphia-Camden-Wilmington, PA-NJ-DE-MD"),
    ("atlanta_sandy_springs_alpharetta", "Atlanta-Sandy Springs-Alpharetta, GA"),
    ("boston_cambridge_newton", "Boston-Cambridge-Newton, MA-NH"),
    ("phoenix_mesa_chandler", "Phoenix-Mesa-Chandler, AZ"),
    ("san_francisco_oakland_berkeley", "San Francisco-Oakland-Berkeley, CA"),
    ("riverside_san_bernardino_ontario", "Riverside-San Bernardino-Ontario, CA"),
    ("detroit_warren_dearborn", "Detroit-Warren-Dearborn, MI"),
    ("seattle_tacoma_bellevue", "Seattle-Tacoma-Bellevue, WA"),
    ("minneapolis_st._paul_bloomington", "Minneapolis-St. Paul-Bloomington, MN-WI"),
    ("san_diego_chula_vista_carlsbad", "San Diego-Chula Vista-Carlsbad, CA"),
    ("tampa_st._petersburg_clearwater", "Tampa-St. Petersburg-Clearwater, FL"),
    ("denver_aurora_lakewood", "Denver-Aurora-Lakewood, CO"),
    ("st._louis", "St. Louis, MO-IL"),
    ("baltimore_columbia_towson", "Baltimore-Columbia-Towson, MD"),
    ("london", "London"),
    ("paris", "Paris"),
    ("berlin", "Berlin"),
    ("madrid", "Madrid"),
    ("rome", "Rome"),
    ("toronto", "Toronto"),
    ("montreal", "Montreal"),
    ("vancouver", "Vancouver"),
    ("mexico_city", "Mexico City"),
    ("guadalajara", "Guadalajara"),
    ("monterrey", "Monterrey"),
    ("mumbai", "Mumbai"),
    ("delhi", "Delhi"),
    ("bangalore", "Bangalore"),
    ("cairo", "Cairo"),
    ("alexandria", "Alexandria"),
];

/// Extract the metro stem from a CSV filename.
///
/// `new_york_newark_jersey_city_occupational_data.csv` ->
/// `new_york_newark_jersey_city`
pub fn metro_stem(filename: &str) -> String {
    filename.replace("_occupational_data.csv", "")
}

/// Country code for a metro stem. Defaults to USA.
pub fn country_for_metro(stem: &str) -> &'static str {
    if let Some(&(_, code)) = METRO_COUNTRY_MAP.iter().find(|(s, _)| *s == stem) {
        return code;
    }
    for &(known, code) in METRO_COUNTRY_MAP {
        if stem.starts_with(known) {
            return code;
        }
    }
    "USA"
}

/// Display name for a metro stem, falling back to title-casing.
pub fn display_name_for_metro(stem: &str) -> String {
    METRO_DISPLAY_NAMES
        .iter()
        .find(|(s, _)| *s == stem)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| title_case(stem))
}

/// Display name for a state stem (`new_york` -> `New York`).
pub fn display_name_for_state(stem: &str) -> String {
    title_case(stem)
}

/// Title-case an underscore-separated stem.
fn title_case(stem: &str) -> String {
    stem.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("iterative"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.year, 2024);
        assert_eq!(parsed.pipeline.country, "USA");
        assert_eq!(parsed.paths.database, "data/jobatlas.db");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[pipeline]
year = 2023
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.year, 2023);
        assert_eq!(config.pipeline.country, "USA");
        assert_eq!(config.paths.export_dir, "public/data");
    }

    #[test]
    fn country_registry() {
        let usa = country("USA").expect("USA registered");
        assert_eq!(usa.code_system, CodeSystem::Soc);
        assert_eq!(country("GBR").expect("GBR").code_system, CodeSystem::Isco);
        assert!(country("ZZZ").is_none());
    }

    #[test]
    fn country_short_codes() {
        assert_eq!(country_short("USA"), "us");
        assert_eq!(country_short("GBR"), "gb");
        assert_eq!(country_short("IND"), "in");
        assert_eq!(country_for_short("us"), "USA");
        assert_eq!(country_for_short("??"), "USA");
    }

    #[test]
    fn major_group_table() {
        assert_eq!(MAJOR_GROUPS.name("11"), Some("Management"));
        assert_eq!(MAJOR_GROUPS.color("11"), "#A973BE");
        assert_eq!(MAJOR_GROUPS.color("00"), "#999999");
        assert_eq!(MAJOR_GROUPS.entries().len(), 22);
    }

    #[test]
    fn metro_stem_extraction() {
        assert_eq!(
            metro_stem("new_york_newark_jersey_city_occupational_data.csv"),
            "new_york_newark_jersey_city"
        );
    }

    #[test]
    fn metro_country_mapping() {
        assert_eq!(country_for_metro("chicago_naperville_elgin"), "USA");
        assert_eq!(country_for_metro("london"), "GBR");
        assert_eq!(country_for_metro("mumbai"), "IND");
        assert_eq!(country_for_metro("cairo"), "EGY");
    }

    #[test]
    fn metro_display_names() {
        let name = display_name_for_metro("new_york_newark_jersey_city");
        assert!(name.contains("New York"));
        assert_eq!(display_name_for_metro("london"), "London");
    }

    #[test]
    fn state_display_names() {
        assert_eq!(display_name_for_state("california"), "California");
        assert_eq!(display_name_for_state("new_york"), "New York");
    }
}
