//! SQLite DDL for the job search store.

pub const SCHEMA: &str = r#"
-- Accounts. Not referenced by any other table: one tenant per database.
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    email TEXT,
    created_at TEXT NOT NULL,
    last_login TEXT
);

-- Saved search locations
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    radius_miles INTEGER DEFAULT 10,
    is_default INTEGER DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Matching criteria. List columns hold JSON arrays.
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT DEFAULT '',
    major TEXT DEFAULT '',
    skills TEXT DEFAULT '[]',
    interests TEXT DEFAULT '[]',
    min_hourly_rate REAL,
    max_hours_per_week INTEGER,
    preferred_job_types TEXT DEFAULT '[]',
    preferred_job_sources TEXT DEFAULT '[]',
    schedule_blocks TEXT DEFAULT '[]',
    resume_text TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Scraped postings, deduplicated on (source, source_id)
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    location TEXT NOT NULL,
    description TEXT DEFAULT '',
    salary_text TEXT,
    salary_min REAL,
    salary_max REAL,
    salary_type TEXT,
    job_type TEXT,
    url TEXT NOT NULL,
    posted_date TEXT,
    scraped_at TEXT NOT NULL,
    match_score REAL,
    match_reasons TEXT DEFAULT '[]',
    extracted_requirements TEXT DEFAULT '[]',
    schedule_compatible INTEGER,  -- NULL = unknown
    UNIQUE(source, source_id)
);

-- Pursuit of a job. Status is free text.
CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    status TEXT DEFAULT 'Saved',
    applied_date TEXT,
    notes TEXT DEFAULT '',
    next_step TEXT,
    next_step_date TEXT,
    cover_letter TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE RESTRICT
);

-- Untyped key-value configuration
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source);
CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company);
CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
CREATE INDEX IF NOT EXISTS idx_applications_job_id ON applications(job_id);
CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
CREATE INDEX IF NOT EXISTS idx_settings_key ON settings(key);
"#;

/// Columns added after the first release, as `(table, column, ALTER statement)`.
/// Applied only when the column is missing.
pub const MIGRATIONS: &[(&str, &str, &str)] = &[(
    "profiles",
    "preferred_job_sources",
    "ALTER TABLE profiles ADD COLUMN preferred_job_sources TEXT DEFAULT '[]'",
)];

pub const TABLES: &[&str] = &[
    "users",
    "locations",
    "profiles",
    "jobs",
    "applications",
    "settings",
];

pub const INDEXES: &[&str] = &[
    "idx_jobs_source",
    "idx_jobs_company",
    "idx_applications_status",
    "idx_applications_job_id",
    "idx_users_username",
    "idx_settings_key",
];
