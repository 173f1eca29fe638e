use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use super::{Database, decode_list, encode_list};
use crate::error::{StoreError, StoreResult};
use crate::models::{Job, MatchResult, SaveOutcome, now_timestamp};

const JOB_COLUMNS: &str = "id, source, source_id, title, company, location, description,
     salary_text, salary_min, salary_max, salary_type, job_type, url, posted_date, scraped_at,
     match_score, match_reasons, extracted_requirements, schedule_compatible";

pub const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct JobFilter {
    pub source: Option<String>,
    pub company: Option<String>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            source: None,
            company: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Insert a full job row. `insert_job` and `save_job` share it.
fn insert_row(conn: &Connection, job: &Job, scraped_at: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO jobs (source, source_id, title, company, location, description,
         salary_text, salary_min, salary_max, salary_type, job_type, url, posted_date,
         scraped_at, match_score, match_reasons, extracted_requirements, schedule_compatible)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            job.source,
            job.source_id,
            job.title,
            job.company,
            job.location,
            job.description,
            job.salary_text,
            job.salary_min,
            job.salary_max,
            job.salary_type,
            job.job_type,
            job.url,
            job.posted_date,
            scraped_at,
            job.match_score,
            encode_list(&job.match_reasons),
            encode_list(&job.extracted_requirements),
            job.schedule_compatible
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Strict insert. A posting already stored for the same `(source, source_id)` fails with
    /// `ConstraintViolation::DuplicateJobSource`.
    pub fn insert_job(&self, job: &Job) -> StoreResult<i64> {
        let scraped_at = if job.scraped_at.is_empty() {
            now_timestamp()
        } else {
            job.scraped_at.clone()
        };

        let id = insert_row(&self.conn, job, &scraped_at)?;
        debug!(id, key = %job.unique_key(), "inserted job");
        Ok(id)
    }

    /// Ingestion upsert keyed on `(source, source_id)`: a re-scraped posting overwrites the
    /// stored copy and keeps its id.
    pub fn save_job(&mut self, job: &mut Job) -> StoreResult<SaveOutcome> {
        if job.scraped_at.is_empty() {
            job.scraped_at = now_timestamp();
        }

        let tx = self.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM jobs WHERE source = ?1 AND source_id = ?2",
                params![job.source, job.source_id],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE jobs SET title = ?1, company = ?2, location = ?3, description = ?4,
                     salary_text = ?5, salary_min = ?6, salary_max = ?7, salary_type = ?8,
                     job_type = ?9, url = ?10, posted_date = ?11, scraped_at = ?12,
                     match_score = ?13, match_reasons = ?14, extracted_requirements = ?15,
                     schedule_compatible = ?16
                     WHERE id = ?17",
                    params![
                        job.title,
                        job.company,
                        job.location,
                        job.description,
                        job.salary_text,
                        job.salary_min,
                        job.salary_max,
                        job.salary_type,
                        job.job_type,
                        job.url,
                        job.posted_date,
                        job.scraped_at,
                        job.match_score,
                        encode_list(&job.match_reasons),
                        encode_list(&job.extracted_requirements),
                        job.schedule_compatible,
                        id
                    ],
                )?;
                job.id = Some(id);
                SaveOutcome::Updated
            }
            None => {
                let id = insert_row(&tx, job, &job.scraped_at)?;
                job.id = Some(id);
                SaveOutcome::Inserted
            }
        };

        tx.commit()?;
        debug!(id = ?job.id, key = %job.unique_key(), ?outcome, "saved job");
        Ok(outcome)
    }

    pub fn get_job(&self, id: i64) -> StoreResult<Option<Job>> {
        let job = self
            .conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                [id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    pub fn find_job(&self, source: &str, source_id: &str) -> StoreResult<Option<Job>> {
        let job = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM jobs WHERE source = ?1 AND source_id = ?2",
                    JOB_COLUMNS
                ),
                [source, source_id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Most recently scraped first.
    pub fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let mut sql = format!("SELECT {} FROM jobs WHERE 1=1", JOB_COLUMNS);
        let mut values: Vec<&dyn ToSql> = Vec::new();

        if let Some(source) = &filter.source {
            values.push(source);
            sql.push_str(&format!(" AND source = ?{}", values.len()));
        }
        if let Some(company) = &filter.company {
            values.push(company);
            sql.push_str(&format!(" AND company = ?{}", values.len()));
        }

        values.push(&limit);
        sql.push_str(&format!(" ORDER BY scraped_at DESC, id DESC LIMIT ?{}", values.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Store match metadata produced by an external scorer.
    pub fn record_match(&self, job_id: i64, result: &MatchResult) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET match_score = ?1, match_reasons = ?2, extracted_requirements = ?3,
             schedule_compatible = ?4
             WHERE id = ?5",
            params![
                result.score,
                encode_list(&result.reasons),
                encode_list(&result.requirements),
                result.schedule_compatible,
                job_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "job", id: job_id });
        }
        debug!(job_id, score = ?result.score, "recorded match");
        Ok(())
    }

    /// Fails with `ConstraintViolation::UnknownJob` while applications still reference the job.
    pub fn delete_job(&self, id: i64) -> StoreResult<bool> {
        let changed = self.conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if changed > 0 {
            info!(id, "deleted job");
        }
        Ok(changed > 0)
    }

    pub fn count_jobs(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        Ok(Job {
            id: row.get(0)?,
            source: row.get(1)?,
            source_id: row.get(2)?,
            title: row.get(3)?,
            company: row.get(4)?,
            location: row.get(5)?,
            description: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            salary_text: row.get(7)?,
            salary_min: row.get(8)?,
            salary_max: row.get(9)?,
            salary_type: row.get(10)?,
            job_type: row.get(11)?,
            url: row.get(12)?,
            posted_date: row.get(13)?,
            scraped_at: row.get(14)?,
            match_score: row.get(15)?,
            match_reasons: decode_list(row, 16, "match_reasons")?,
            extracted_requirements: decode_list(row, 17, "extracted_requirements")?,
            schedule_compatible: row.get(18)?,
        })
    }
}
