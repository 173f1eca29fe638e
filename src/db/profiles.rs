use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::{Database, decode_list, encode_list};
use crate::error::{StoreError, StoreResult};
use crate::models::{Profile, now_timestamp};

const PROFILE_COLUMNS: &str = "id, name, major, skills, interests, min_hourly_rate, max_hours_per_week,
     preferred_job_types, preferred_job_sources, schedule_blocks, resume_text, created_at, updated_at";

impl Database {
    /// The database holds a single profile; this returns the first row.
    pub fn get_profile(&self) -> StoreResult<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {} FROM profiles ORDER BY id LIMIT 1", PROFILE_COLUMNS),
                [],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Insert a profile row carrying only timestamps, leaving every other column to its default.
    pub fn insert_default_profile(&self) -> StoreResult<i64> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO profiles (created_at, updated_at) VALUES (?1, ?2)",
            params![now, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert when `profile.id` is unset, otherwise update that row.
    pub fn save_profile(&self, profile: &mut Profile) -> StoreResult<()> {
        let now = now_timestamp();
        let skills = encode_list(&profile.skills);
        let interests = encode_list(&profile.interests);
        let job_types = encode_list(&profile.preferred_job_types);
        let job_sources = encode_list(&profile.preferred_job_sources);
        let schedule = encode_list(&profile.schedule_blocks);

        match profile.id {
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE profiles SET name = ?1, major = ?2, skills = ?3, interests = ?4,
                     min_hourly_rate = ?5, max_hours_per_week = ?6, preferred_job_types = ?7,
                     preferred_job_sources = ?8, schedule_blocks = ?9, resume_text = ?10,
                     updated_at = ?11
                     WHERE id = ?12",
                    params![
                        profile.name,
                        profile.major,
                        skills,
                        interests,
                        profile.min_hourly_rate,
                        profile.max_hours_per_week,
                        job_types,
                        job_sources,
                        schedule,
                        profile.resume_text,
                        now,
                        id
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound { entity: "profile", id });
                }
                debug!(id, "updated profile");
            }
            None => {
                self.conn.execute(
                    "INSERT INTO profiles (name, major, skills, interests, min_hourly_rate,
                     max_hours_per_week, preferred_job_types, preferred_job_sources,
                     schedule_blocks, resume_text, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                    params![
                        profile.name,
                        profile.major,
                        skills,
                        interests,
                        profile.min_hourly_rate,
                        profile.max_hours_per_week,
                        job_types,
                        job_sources,
                        schedule,
                        profile.resume_text,
                        now
                    ],
                )?;
                let id = self.conn.last_insert_rowid();
                profile.id = Some(id);
                profile.created_at = now.clone();
                debug!(id, "created profile");
            }
        }
        profile.updated_at = now;
        Ok(())
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            major: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            skills: decode_list(row, 3, "skills")?,
            interests: decode_list(row, 4, "interests")?,
            min_hourly_rate: row.get(5)?,
            max_hours_per_week: row.get(6)?,
            preferred_job_types: decode_list(row, 7, "preferred_job_types")?,
            preferred_job_sources: decode_list(row, 8, "preferred_job_sources")?,
            schedule_blocks: decode_list(row, 9, "schedule_blocks")?,
            resume_text: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::error::StoreError;
    use crate::models::{Profile, ScheduleBlock};

    #[test]
    fn test_defaults_read_back_as_empty_lists() {
        let db = test_db();
        db.insert_default_profile().unwrap();

        let raw: (String, String, String) = db
            .conn
            .query_row("SELECT skills, name, schedule_blocks FROM profiles", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(raw, ("[]".to_string(), String::new(), "[]".to_string()));

        let profile = db.get_profile().unwrap().unwrap();
        assert!(profile.skills.is_empty());
        assert!(profile.interests.is_empty());
        assert!(profile.schedule_blocks.is_empty());
        assert_eq!(profile.major, "");
        assert_eq!(profile.min_hourly_rate, None);
    }

    #[test]
    fn test_save_inserts_then_updates() {
        let db = test_db();
        assert!(db.get_profile().unwrap().is_none());

        let mut profile = Profile {
            name: "Sam".into(),
            major: "Computer Science".into(),
            skills: vec!["rust".into(), "sql".into()],
            min_hourly_rate: Some(18.5),
            schedule_blocks: vec![ScheduleBlock {
                day: "Mon".into(),
                start_time: "9:00".into(),
                end_time: "10:30".into(),
                label: Some("CS101".into()),
            }],
            ..Default::default()
        };
        db.save_profile(&mut profile).unwrap();
        let id = profile.id.unwrap();
        assert!(!profile.created_at.is_empty());

        profile.interests = vec!["tutoring".into()];
        profile.max_hours_per_week = Some(20);
        db.save_profile(&mut profile).unwrap();
        assert_eq!(profile.id, Some(id));

        let stored = db.get_profile().unwrap().unwrap();
        assert_eq!(stored.skills, vec!["rust", "sql"]);
        assert_eq!(stored.interests, vec!["tutoring"]);
        assert_eq!(stored.max_hours_per_week, Some(20));
        assert_eq!(stored.schedule_blocks[0].label.as_deref(), Some("CS101"));
    }

    #[test]
    fn test_update_missing_profile() {
        let db = test_db();
        let mut profile = Profile {
            id: Some(42),
            ..Default::default()
        };
        let err = db.save_profile(&mut profile).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "profile", id: 42 }));
    }

    #[test]
    fn test_malformed_list_names_column() {
        let db = test_db();
        db.conn
            .execute(
                "INSERT INTO profiles (skills, created_at, updated_at) VALUES ('rust, sql', 'x', 'x')",
                [],
            )
            .unwrap();
        match db.get_profile().unwrap_err() {
            StoreError::Decode(e) => assert_eq!(e.column, "skills"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_list_reads_empty() {
        let db = test_db();
        db.conn
            .execute(
                "INSERT INTO profiles (skills, interests, created_at, updated_at) VALUES (NULL, '', 'x', 'x')",
                [],
            )
            .unwrap();
        let profile = db.get_profile().unwrap().unwrap();
        assert!(profile.skills.is_empty());
        assert!(profile.interests.is_empty());
    }
}
