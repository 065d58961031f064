//! SQL migration definitions for the JobAtlas database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: countries, regions, occupations",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Supported countries and their occupation-code systems
CREATE TABLE IF NOT EXISTS countries (
    id          INTEGER PRIMARY KEY,
    code        TEXT UNIQUE NOT NULL,
    name        TEXT NOT NULL,
    code_system TEXT NOT NULL,
    currency    TEXT NOT NULL DEFAULT 'USD'
);

-- Regions within a country (national, state, or metro granularity)
CREATE TABLE IF NOT EXISTS regions (
    id          INTEGER PRIMARY KEY,
    country_id  INTEGER NOT NULL REFERENCES countries(id),
    name        TEXT NOT NULL,
    region_type TEXT NOT NULL,
    UNIQUE(country_id, name, region_type)
);

-- Occupation records per (year, region, code); gdp is always
-- employment * mean_annual_wage, recomputed on every write
CREATE TABLE IF NOT EXISTS occupations (
    id               INTEGER PRIMARY KEY,
    year             INTEGER NOT NULL,
    region_id        INTEGER NOT NULL REFERENCES regions(id),
    occupation_code  TEXT NOT NULL,
    occupation_title TEXT NOT NULL,
    major_group_name TEXT NOT NULL,
    employment       INTEGER NOT NULL,
    mean_annual_wage INTEGER NOT NULL,
    gdp              BIGINT NOT NULL,
    complexity_score REAL NOT NULL DEFAULT 0.5,
    UNIQUE(year, region_id, occupation_code)
);

CREATE INDEX IF NOT EXISTS idx_occ_year ON occupations(year);
CREATE INDEX IF NOT EXISTS idx_occ_region ON occupations(region_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
