use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{Location, now_timestamp};

const LOCATION_COLUMNS: &str =
    "id, name, address, latitude, longitude, radius_miles, is_default, created_at";

impl Database {
    /// Insert or update a location. Marking one default clears the flag everywhere else;
    /// the schema itself allows several defaults.
    pub fn save_location(&mut self, location: &mut Location) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        if location.is_default {
            tx.execute("UPDATE locations SET is_default = 0", [])?;
        }

        match location.id {
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE locations SET name = ?1, address = ?2, latitude = ?3, longitude = ?4,
                     radius_miles = ?5, is_default = ?6
                     WHERE id = ?7",
                    params![
                        location.name,
                        location.address,
                        location.latitude,
                        location.longitude,
                        location.radius_miles,
                        location.is_default,
                        id
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound { entity: "location", id });
                }
            }
            None => {
                let now = now_timestamp();
                tx.execute(
                    "INSERT INTO locations (name, address, latitude, longitude, radius_miles,
                     is_default, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        location.name,
                        location.address,
                        location.latitude,
                        location.longitude,
                        location.radius_miles,
                        location.is_default,
                        now
                    ],
                )?;
                location.id = Some(tx.last_insert_rowid());
                location.created_at = now;
            }
        }

        tx.commit()?;
        debug!(id = ?location.id, name = %location.name, "saved location");
        Ok(())
    }

    /// Default location first, then alphabetical.
    pub fn list_locations(&self) -> StoreResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM locations ORDER BY is_default DESC, name",
            LOCATION_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_location)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_location(&self, id: i64) -> StoreResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!("SELECT {} FROM locations WHERE id = ?1", LOCATION_COLUMNS),
                [id],
                Self::row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    pub fn default_location(&self) -> StoreResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM locations WHERE is_default = 1 ORDER BY id LIMIT 1",
                    LOCATION_COLUMNS
                ),
                [],
                Self::row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    /// Returns false when no such location existed.
    pub fn delete_location(&self, id: i64) -> StoreResult<bool> {
        let changed = self.conn.execute("DELETE FROM locations WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<Location> {
        Ok(Location {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            radius_miles: row
                .get::<_, Option<i64>>(5)?
                .unwrap_or(crate::models::DEFAULT_RADIUS_MILES),
            is_default: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::error::{ConstraintViolation, StoreError};
    use crate::models::Location;

    #[test]
    fn test_schema_defaults() {
        let db = test_db();
        db.conn
            .execute(
                "INSERT INTO locations (name, address, created_at) VALUES ('Campus', '1 Shields Ave', '2024-01-01')",
                [],
            )
            .unwrap();
        let location = db.list_locations().unwrap().remove(0);
        assert_eq!(location.radius_miles, 10);
        assert!(!location.is_default);
        assert_eq!(location.latitude, None);
    }

    #[test]
    fn test_only_one_default_after_save() {
        let mut db = test_db();
        let mut home = Location::new("Home", "12 Elm St");
        home.is_default = true;
        db.save_location(&mut home).unwrap();

        let mut campus = Location::new("Campus", "1 Shields Ave");
        campus.radius_miles = 5;
        db.save_location(&mut campus).unwrap();
        assert_eq!(db.default_location().unwrap().unwrap().name, "Home");

        campus.is_default = true;
        db.save_location(&mut campus).unwrap();

        let listed = db.list_locations().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Campus");
        assert!(listed[0].is_default);
        assert!(!listed[1].is_default);
        assert_eq!(db.default_location().unwrap().unwrap().radius_miles, 5);
    }

    #[test]
    fn test_name_and_address_required() {
        let db = test_db();
        let err: StoreError = db
            .conn
            .execute(
                "INSERT INTO locations (name, created_at) VALUES ('Nowhere', 'x')",
                [],
            )
            .unwrap_err()
            .into();
        assert_eq!(
            err.constraint(),
            Some(&ConstraintViolation::MissingValue {
                table: "locations".into(),
                column: "address".into()
            })
        );
    }

    #[test]
    fn test_delete_location() {
        let mut db = test_db();
        let mut loc = Location::new("Library", "100 NW Quad");
        db.save_location(&mut loc).unwrap();
        let id = loc.id.unwrap();

        assert!(db.get_location(id).unwrap().is_some());
        assert!(db.delete_location(id).unwrap());
        assert!(!db.delete_location(id).unwrap());
        assert!(db.get_location(id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_location_rolls_back_default_reset() {
        let mut db = test_db();
        let mut home = Location::new("Home", "12 Elm St");
        home.is_default = true;
        db.save_location(&mut home).unwrap();

        let mut ghost = Location::new("Ghost", "nowhere");
        ghost.id = Some(999);
        ghost.is_default = true;
        assert!(db.save_location(&mut ghost).is_err());

        assert_eq!(db.default_location().unwrap().unwrap().name, "Home");
    }
}
