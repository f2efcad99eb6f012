//! Location repository contract and SQLite implementation.

use super::{parse_uuid, RepoError, RepoResult};
use crate::model::location::{Location, LocationId, Rgba, UNKNOWN_LOCATION_VISITATION_ORDER};
use crate::model::EntityRef;
use rusqlite::{params, Connection, Row};

const LOCATION_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    visitation_order,
    red,
    green,
    blue,
    opacity
FROM locations";

/// Filter options for listing locations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationListQuery {
    /// Leave out the unknown location.
    pub user_only: bool,
}

/// Repository interface for location CRUD operations.
pub trait LocationRepository {
    fn upsert_location(&self, location: &Location) -> RepoResult<()>;
    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    fn delete_location(&self, id: LocationId) -> RepoResult<()>;
    /// Lists locations ordered by `visitation_order ASC, uuid ASC`.
    fn list_locations(&self, query: &LocationListQuery) -> RepoResult<Vec<Location>>;
}

/// SQLite-backed location repository.
pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn upsert_location(&self, location: &Location) -> RepoResult<()> {
        location.validate()?;

        self.conn.execute(
            "INSERT INTO locations (
                uuid,
                name,
                visitation_order,
                red,
                green,
                blue,
                opacity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                visitation_order = excluded.visitation_order,
                red = excluded.red,
                green = excluded.green,
                blue = excluded.blue,
                opacity = excluded.opacity,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                location.id.to_string(),
                location.name.as_str(),
                location.visitation_order,
                location.color.red,
                location.color.green,
                location.color.blue,
                location.color.opacity,
            ],
        )?;
        Ok(())
    }

    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LOCATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_location_row(row)?));
        }
        Ok(None)
    }

    fn delete_location(&self, id: LocationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM locations WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Location(id)));
        }
        Ok(())
    }

    fn list_locations(&self, query: &LocationListQuery) -> RepoResult<Vec<Location>> {
        let mut sql = LOCATION_SELECT_SQL.to_string();
        if query.user_only {
            sql.push_str(" WHERE visitation_order <> ?1");
        }
        sql.push_str(" ORDER BY visitation_order ASC, uuid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = if query.user_only {
            stmt.query([UNKNOWN_LOCATION_VISITATION_ORDER])?
        } else {
            stmt.query([])?
        };

        let mut locations = Vec::new();
        while let Some(row) = rows.next()? {
            locations.push(parse_location_row(row)?);
        }
        Ok(locations)
    }
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    let uuid_text: String = row.get("uuid")?;
    let location = Location {
        id: parse_uuid(&uuid_text, "locations.uuid")?,
        name: row.get("name")?,
        visitation_order: row.get("visitation_order")?,
        color: Rgba {
            red: row.get("red")?,
            green: row.get("green")?,
            blue: row.get("blue")?,
            opacity: row.get("opacity")?,
        },
    };
    location
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("location {}: {err}", location.id)))?;
    Ok(location)
}
