//! Item repository contract and SQLite implementation.

use super::{bool_to_int, int_to_bool, parse_uuid, RepoError, RepoResult};
use crate::model::item::{Item, ItemId};
use crate::model::location::LocationId;
use crate::model::EntityRef;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    quantity,
    on_list,
    is_available,
    date_last_purchased,
    location_uuid
FROM items";

/// Filter options for listing items.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemListQuery {
    pub on_list: Option<bool>,
    pub location: Option<LocationId>,
}

/// Persisted item row.
///
/// The location may be missing in storage; the entity store heals it when the
/// graph is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub item: Item,
    pub location: Option<LocationId>,
}

/// Repository interface for item CRUD operations.
pub trait ItemRepository {
    fn upsert_item(&self, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<StoredItem>>;
    fn delete_item(&self, id: ItemId) -> RepoResult<()>;
    /// Lists items ordered by `name ASC, uuid ASC`.
    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<StoredItem>>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn upsert_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO items (
                uuid,
                name,
                quantity,
                on_list,
                is_available,
                date_last_purchased,
                location_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                quantity = excluded.quantity,
                on_list = excluded.on_list,
                is_available = excluded.is_available,
                date_last_purchased = excluded.date_last_purchased,
                location_uuid = excluded.location_uuid,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                item.id.to_string(),
                item.name.as_str(),
                item.quantity,
                bool_to_int(item.on_list),
                bool_to_int(item.is_available),
                item.date_last_purchased,
                item.location.to_string(),
            ],
        )?;
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<StoredItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Item(id)));
        }
        Ok(())
    }

    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<StoredItem>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(on_list) = query.on_list {
            sql.push_str(" AND on_list = ?");
            bind_values.push(Value::Integer(bool_to_int(on_list)));
        }
        if let Some(location) = query.location {
            sql.push_str(" AND location_uuid = ?");
            bind_values.push(Value::Text(location.to_string()));
        }
        sql.push_str(" ORDER BY name ASC, uuid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<StoredItem> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "items.uuid")?;
    let location = match row.get::<_, Option<String>>("location_uuid")? {
        Some(text) => Some(parse_uuid(&text, "items.location_uuid")?),
        None => None,
    };

    let item = Item {
        id,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
        on_list: int_to_bool(row.get("on_list")?, "items.on_list")?,
        is_available: int_to_bool(row.get("is_available")?, "items.is_available")?,
        date_last_purchased: row.get("date_last_purchased")?,
        // Placeholder until the store resolves the reference.
        location: location.unwrap_or_else(uuid::Uuid::nil),
    };
    item.validate()
        .map_err(|err| RepoError::InvalidData(format!("item {id}: {err}")))?;
    Ok(StoredItem { item, location })
}
