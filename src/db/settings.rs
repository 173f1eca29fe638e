use rusqlite::{OptionalExtension, params};
use serde_json::{Map, Value};
use tracing::debug;

use super::Database;
use crate::error::StoreResult;
use crate::models::{Setting, now_timestamp};

impl Database {
    /// Upsert a setting, touching `updated_at`.
    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now_timestamp()],
        )?;
        debug!(key, "saved setting");
        Ok(())
    }

    /// Strict insert; an existing key fails with `ConstraintViolation::DuplicateSettingKey`.
    pub fn insert_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now_timestamp()],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        let changed = self.conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(changed > 0)
    }

    /// Store each entry as `prefix.key`. Strings are stored raw, anything else as JSON.
    pub fn save_settings_group(&mut self, prefix: &str, values: &Map<String, Value>) -> StoreResult<()> {
        let now = now_timestamp();
        let tx = self.conn.transaction()?;
        for (key, value) in values {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![format!("{}.{}", prefix, key), text, now],
            )?;
        }
        tx.commit()?;
        debug!(prefix, count = values.len(), "saved settings group");
        Ok(())
    }

    /// Read back `prefix.*`. Values that parse as JSON are decoded; the rest stay strings.
    pub fn settings_group(&self, prefix: &str) -> StoreResult<Map<String, Value>> {
        let dotted = format!("{}.", prefix);
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings WHERE substr(key, 1, length(?1)) = ?1")?;
        let rows = stmt.query_map([&dotted], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut group = Map::new();
        for row in rows {
            let (key, raw) = row?;
            let Some(name) = key.strip_prefix(&dotted) else {
                continue;
            };
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            group.insert(name.to_string(), value);
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::error::ConstraintViolation;
    use serde_json::{Map, Value, json};

    #[test]
    fn test_upsert_and_get() {
        let db = test_db();
        assert_eq!(db.get_setting("theme").unwrap(), None);

        db.set_setting("theme", "dark").unwrap();
        db.set_setting("theme", "light").unwrap();
        assert_eq!(db.get_setting("theme").unwrap().as_deref(), Some("light"));
        assert_eq!(db.list_settings().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_key_rejected_on_insert() {
        let db = test_db();
        db.insert_setting("ai.provider", "claude").unwrap();
        let err = db.insert_setting("ai.provider", "ollama").unwrap_err();
        assert_eq!(err.constraint(), Some(&ConstraintViolation::DuplicateSettingKey));
        assert_eq!(db.get_setting("ai.provider").unwrap().as_deref(), Some("claude"));
    }

    #[test]
    fn test_value_required() {
        let db = test_db();
        let err: crate::error::StoreError = db
            .conn
            .execute(
                "INSERT INTO settings (key, updated_at) VALUES ('k', 'x')",
                [],
            )
            .unwrap_err()
            .into();
        assert_eq!(
            err.constraint(),
            Some(&ConstraintViolation::MissingValue {
                table: "settings".into(),
                column: "value".into()
            })
        );
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        db.set_setting("k", "v").unwrap();
        assert!(db.delete_setting("k").unwrap());
        assert!(!db.delete_setting("k").unwrap());
    }

    #[test]
    fn test_settings_group_round_trip() {
        let mut db = test_db();
        let mut values = Map::new();
        values.insert("provider".into(), json!("claude"));
        values.insert("use_auth".into(), json!(true));
        values.insert("max_results".into(), json!(50));
        db.save_settings_group("ai", &values).unwrap();
        db.set_setting("aix.other", "not in group").unwrap();
        db.set_setting("uni.name", "UC Davis").unwrap();

        assert_eq!(db.get_setting("ai.use_auth").unwrap().as_deref(), Some("true"));

        let group = db.settings_group("ai").unwrap();
        assert_eq!(group.len(), 3);
        assert_eq!(group["provider"], Value::String("claude".into()));
        assert_eq!(group["use_auth"], Value::Bool(true));
        assert_eq!(group["max_results"], json!(50));

        let uni = db.settings_group("uni").unwrap();
        assert_eq!(uni["name"], json!("UC Davis"));
    }
}
