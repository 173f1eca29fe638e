use serde::{Deserialize, Serialize};

/// Instants written by the store, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Calendar dates (posted, applied, next step).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_STATUS: &str = "Saved";
pub const DEFAULT_RADIUS_MILES: i64 = 10;

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn today() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// A user row as written, with the hash already computed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: String,
}

/// A block of time when the user is NOT available (a class, another shift).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub day: String, // "Mon" .. "Sun"
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub name: String,
    pub major: String,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub min_hourly_rate: Option<f64>,
    pub max_hours_per_week: Option<i64>,
    pub preferred_job_types: Vec<String>,  // "Part-time", "Internship", ...
    pub preferred_job_sources: Vec<String>, // "indeed", "linkedin", ...
    pub schedule_blocks: Vec<ScheduleBlock>,
    pub resume_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Option<i64>,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_miles: i64,
    pub is_default: bool,
    pub created_at: String,
}

impl Location {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            address: address.to_string(),
            latitude: None,
            longitude: None,
            radius_miles: DEFAULT_RADIUS_MILES,
            is_default: false,
            created_at: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: Option<i64>,
    pub source: String,    // "indeed", "linkedin", "handshake", ...
    pub source_id: String, // the board's own listing id
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_type: Option<String>, // "hourly", "yearly"
    pub job_type: Option<String>,
    pub url: String,
    pub posted_date: Option<String>,
    pub scraped_at: String,
    // Written by an external matcher
    pub match_score: Option<f64>,
    pub match_reasons: Vec<String>,
    pub extracted_requirements: Vec<String>,
    pub schedule_compatible: Option<bool>,
}

impl Job {
    /// Deduplication key, `source:source_id`.
    pub fn unique_key(&self) -> String {
        format!("{}:{}", self.source, self.source_id)
    }
}

/// Match metadata computed outside the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: Option<f64>,
    pub reasons: Vec<String>,
    pub requirements: Vec<String>,
    pub schedule_compatible: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub title: String,
    pub company: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Option<i64>,
    pub job_id: i64,
    pub status: String, // free text, "Saved" by default
    pub applied_date: Option<String>,
    pub notes: String,
    pub next_step: Option<String>,
    pub next_step_date: Option<String>,
    pub cover_letter: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub job: Option<JobSummary>, // joined, not stored
}

impl Application {
    pub fn new(job_id: i64) -> Self {
        Self {
            id: None,
            job_id,
            status: DEFAULT_STATUS.to_string(),
            applied_date: None,
            notes: String::new(),
            next_step: None,
            next_step_date: None,
            cover_letter: None,
            created_at: String::new(),
            updated_at: String::new(),
            job: None,
        }
    }
}

/// Insert payload where omitted columns fall back to the schema defaults.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub job_id: i64,
    pub status: Option<String>,
    pub applied_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_key() {
        let job = Job {
            source: "indeed".into(),
            source_id: "123".into(),
            ..Default::default()
        };
        assert_eq!(job.unique_key(), "indeed:123");
    }

    #[test]
    fn test_job_deserializes_with_defaults() {
        let job: Job = serde_json::from_str(
            r#"{"source":"linkedin","source_id":"9","title":"Barista","company":"Cafe","location":"Davis, CA","url":"http://x"}"#,
        )
        .unwrap();
        assert!(job.match_reasons.is_empty());
        assert_eq!(job.schedule_compatible, None);
        assert_eq!(job.description, "");
    }

    #[test]
    fn test_new_application_defaults() {
        let app = Application::new(4);
        assert_eq!(app.status, "Saved");
        assert_eq!(app.notes, "");
        assert!(app.id.is_none());
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = now_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
        assert!(chrono::NaiveDate::parse_from_str(&today(), DATE_FORMAT).is_ok());
    }
}
