use rusqlite::{OptionalExtension, ToSql, params, params_from_iter};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{Application, JobSummary, NewApplication, now_timestamp};

const APPLICATION_COLUMNS: &str = "a.id, a.job_id, a.status, a.applied_date, a.notes, a.next_step,
     a.next_step_date, a.cover_letter, a.created_at, a.updated_at";

impl Database {
    /// Insert with schema defaults for whatever the payload leaves out (`status` = 'Saved',
    /// `notes` = ''). The job must exist.
    pub fn insert_application(&self, new: &NewApplication) -> StoreResult<i64> {
        let now = now_timestamp();
        let mut columns = vec!["job_id", "created_at", "updated_at"];
        let mut values: Vec<&dyn ToSql> = Vec::new();
        values.push(&new.job_id);
        values.push(&now);
        values.push(&now);

        if let Some(status) = &new.status {
            columns.push("status");
            values.push(status);
        }
        if let Some(applied) = &new.applied_date {
            columns.push("applied_date");
            values.push(applied);
        }
        if let Some(notes) = &new.notes {
            columns.push("notes");
            values.push(notes);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO applications ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(values))?;

        let id = self.conn.last_insert_rowid();
        info!(id, job_id = new.job_id, "tracking application");
        Ok(id)
    }

    /// Insert when `app.id` is unset, otherwise update that row. `updated_at` is always touched.
    pub fn save_application(&self, app: &mut Application) -> StoreResult<()> {
        let now = now_timestamp();
        match app.id {
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE applications SET job_id = ?1, status = ?2, applied_date = ?3,
                     notes = ?4, next_step = ?5, next_step_date = ?6, cover_letter = ?7,
                     updated_at = ?8
                     WHERE id = ?9",
                    params![
                        app.job_id,
                        app.status,
                        app.applied_date,
                        app.notes,
                        app.next_step,
                        app.next_step_date,
                        app.cover_letter,
                        now,
                        id
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound { entity: "application", id });
                }
            }
            None => {
                self.conn.execute(
                    "INSERT INTO applications (job_id, status, applied_date, notes, next_step,
                     next_step_date, cover_letter, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                    params![
                        app.job_id,
                        app.status,
                        app.applied_date,
                        app.notes,
                        app.next_step,
                        app.next_step_date,
                        app.cover_letter,
                        now
                    ],
                )?;
                app.id = Some(self.conn.last_insert_rowid());
                app.created_at = now.clone();
            }
        }
        app.updated_at = now;
        debug!(id = ?app.id, status = %app.status, "saved application");
        Ok(())
    }

    pub fn get_application(&self, id: i64) -> StoreResult<Option<Application>> {
        let app = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, j.title, j.company FROM applications a
                     LEFT JOIN jobs j ON a.job_id = j.id
                     WHERE a.id = ?1",
                    APPLICATION_COLUMNS
                ),
                [id],
                Self::row_to_application_with_job,
            )
            .optional()?;
        Ok(app)
    }

    /// The oldest application for a job, if any. The schema allows several.
    pub fn application_for_job(&self, job_id: i64) -> StoreResult<Option<Application>> {
        Ok(self.applications_for_job(job_id)?.into_iter().next())
    }

    pub fn applications_for_job(&self, job_id: i64) -> StoreResult<Vec<Application>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM applications a WHERE a.job_id = ?1 ORDER BY a.id",
            APPLICATION_COLUMNS
        ))?;
        let rows = stmt.query_map([job_id], Self::row_to_application)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Applications joined with their job's title and company, most recently updated first.
    pub fn list_applications(&self, status: Option<&str>) -> StoreResult<Vec<Application>> {
        let mut sql = format!(
            "SELECT {}, j.title, j.company FROM applications a
             JOIN jobs j ON a.job_id = j.id",
            APPLICATION_COLUMNS
        );
        if status.is_some() {
            sql.push_str(" WHERE a.status = ?1");
        }
        sql.push_str(" ORDER BY a.updated_at DESC, a.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map([s], Self::row_to_application_with_job)?
        } else {
            stmt.query_map([], Self::row_to_application_with_job)?
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_application_status(&self, id: i64, status: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now_timestamp(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "application", id });
        }
        info!(id, status, "application status changed");
        Ok(())
    }

    pub fn delete_application(&self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM applications WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Count of applications per status. Rows with a NULL status are counted under "",
    /// together with rows whose status is empty text.
    pub fn application_stats(&self) -> StoreResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(status, ''), COUNT(*) FROM applications GROUP BY COALESCE(status, '')",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<BTreeMap<_, _>, _>>()?)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        Ok(Application {
            id: row.get(0)?,
            job_id: row.get(1)?,
            status: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            applied_date: row.get(3)?,
            notes: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            next_step: row.get(5)?,
            next_step_date: row.get(6)?,
            cover_letter: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            job: None,
        })
    }

    fn row_to_application_with_job(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let mut app = Self::row_to_application(row)?;
        let title: Option<String> = row.get(10)?;
        let company: Option<String> = row.get(11)?;
        if let (Some(title), Some(company)) = (title, company) {
            app.job = Some(JobSummary { title, company });
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{sample_job, test_db};
    use crate::error::{ConstraintViolation, StoreError};
    use crate::models::{Application, NewApplication};

    #[test]
    fn test_status_defaults_to_saved() {
        let db = test_db();
        let job_id = db.insert_job(&sample_job("indeed", "123")).unwrap();
        let id = db
            .insert_application(&NewApplication {
                job_id,
                ..Default::default()
            })
            .unwrap();

        let app = db.get_application(id).unwrap().unwrap();
        assert_eq!(app.status, "Saved");
        assert_eq!(app.notes, "");
        assert_eq!(app.job.unwrap().company, "Acme");
    }

    #[test]
    fn test_unknown_job_rejected() {
        let db = test_db();
        let err = db
            .insert_application(&NewApplication {
                job_id: 404,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.constraint(), Some(&ConstraintViolation::UnknownJob));

        let mut app = Application::new(404);
        let err = db.save_application(&mut app).unwrap_err();
        assert_eq!(err.constraint(), Some(&ConstraintViolation::UnknownJob));
        assert!(app.id.is_none());
    }

    #[test]
    fn test_multiple_applications_per_job_allowed() {
        let db = test_db();
        let job_id = db.insert_job(&sample_job("indeed", "1")).unwrap();
        let first = db
            .insert_application(&NewApplication {
                job_id,
                ..Default::default()
            })
            .unwrap();
        db.insert_application(&NewApplication {
            job_id,
            status: Some("Applied".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(db.applications_for_job(job_id).unwrap().len(), 2);
        assert_eq!(db.application_for_job(job_id).unwrap().unwrap().id, Some(first));
        assert!(db.application_for_job(job_id + 1).unwrap().is_none());
    }

    #[test]
    fn test_save_list_and_stats() {
        let db = test_db();
        let acme = db.insert_job(&sample_job("indeed", "1")).unwrap();
        let mut globex_job = sample_job("linkedin", "2");
        globex_job.company = "Globex".into();
        let globex = db.insert_job(&globex_job).unwrap();

        let mut a = Application::new(acme);
        db.save_application(&mut a).unwrap();
        let mut b = Application::new(globex);
        b.status = "Interview".into();
        b.next_step = Some("Onsite".into());
        b.next_step_date = Some("2024-02-01".into());
        db.save_application(&mut b).unwrap();

        let all = db.list_applications(None).unwrap();
        assert_eq!(all.len(), 2);
        let interviewing = db.list_applications(Some("Interview")).unwrap();
        assert_eq!(interviewing.len(), 1);
        assert_eq!(interviewing[0].job.as_ref().unwrap().company, "Globex");
        assert_eq!(interviewing[0].next_step.as_deref(), Some("Onsite"));

        // Free text: anything goes
        db.update_application_status(a.id.unwrap(), "Ghosted").unwrap();
        let stats = db.application_stats().unwrap();
        assert_eq!(stats.get("Ghosted"), Some(&1));
        assert_eq!(stats.get("Interview"), Some(&1));
        assert_eq!(stats.get("Saved"), None);
    }

    #[test]
    fn test_stats_merge_null_and_empty_status() {
        let db = test_db();
        let job_id = db.insert_job(&sample_job("indeed", "1")).unwrap();
        db.conn
            .execute_batch(&format!(
                "INSERT INTO applications (job_id, status, created_at, updated_at)
                 VALUES ({job_id}, NULL, 't', 't'), ({job_id}, '', 't', 't'), ({job_id}, 'Applied', 't', 't');"
            ))
            .unwrap();

        let stats = db.application_stats().unwrap();
        assert_eq!(stats.get(""), Some(&2));
        assert_eq!(stats.get("Applied"), Some(&1));
        assert_eq!(stats.values().sum::<i64>(), 3);
    }

    #[test]
    fn test_update_and_delete() {
        let db = test_db();
        let job_id = db.insert_job(&sample_job("indeed", "1")).unwrap();
        let mut app = Application::new(job_id);
        db.save_application(&mut app).unwrap();
        let id = app.id.unwrap();

        app.notes = "Referred by Pat".into();
        app.applied_date = Some("2024-01-15".into());
        app.status = "Applied".into();
        db.save_application(&mut app).unwrap();

        let stored = db.get_application(id).unwrap().unwrap();
        assert_eq!(stored.notes, "Referred by Pat");
        assert_eq!(stored.applied_date.as_deref(), Some("2024-01-15"));

        assert!(db.delete_application(id).unwrap());
        assert!(!db.delete_application(id).unwrap());
        assert!(db.get_application(id).unwrap().is_none());

        let err = db.update_application_status(id, "Applied").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "application", .. }));
    }
}
