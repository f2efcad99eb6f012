//! Archive record shapes.
//!
//! Field names are camelCase on the wire:
//! `{id, name, visitationOrder, red, green, blue, opacity, items: [...]}` and
//! `{id, name, onList, isAvailable, quantity}`.

use super::{ArchiveError, ArchiveResult};
use crate::model::item::{Item, ItemId};
use crate::model::location::{Location, LocationId, Rgba};
use serde::{Deserialize, Serialize};

/// One item inside a location record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub on_list: bool,
    pub is_available: bool,
    pub quantity: i32,
}

impl ItemRecord {
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            on_list: item.on_list,
            is_available: item.is_available,
            quantity: item.quantity,
        }
    }
}

/// One location with its items nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: LocationId,
    pub name: String,
    pub visitation_order: i32,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub opacity: f64,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl LocationRecord {
    pub fn from_location(location: &Location, items: Vec<ItemRecord>) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            visitation_order: location.visitation_order,
            red: location.color.red,
            green: location.color.green,
            blue: location.color.blue,
            opacity: location.color.opacity,
            items,
        }
    }

    pub fn color(&self) -> Rgba {
        Rgba {
            red: self.red,
            green: self.green,
            blue: self.blue,
            opacity: self.opacity,
        }
    }
}

/// Checks every record before an import touches the store.
///
/// Location fields are only checked where `creates_location` says the
/// record becomes a new location; matched records never write them.
/// Nested items are always checked.
pub(crate) fn validate_records(
    records: &[LocationRecord],
    creates_location: impl Fn(&LocationRecord) -> bool,
) -> ArchiveResult<()> {
    for record in records {
        if creates_location(record) {
            let location = Location {
                id: record.id,
                name: record.name.clone(),
                visitation_order: record.visitation_order,
                color: record.color(),
            };
            location
                .validate()
                .map_err(|err| ArchiveError::Invalid(format!("location {}: {err}", record.id)))?;
        }

        for item in &record.items {
            let mut candidate = Item::with_id(item.id, item.name.clone(), record.id);
            candidate.quantity = item.quantity;
            candidate
                .validate()
                .map_err(|err| ArchiveError::Invalid(format!("item {}: {err}", item.id)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::LocationRecord;

    #[test]
    fn decodes_camel_case_records() {
        let json = r#"[{
            "id": "6F9619FF-8B86-D011-B42D-00C04FC964FF",
            "name": "Market",
            "visitationOrder": 3,
            "red": 0.1, "green": 0.2, "blue": 0.3, "opacity": 1.0,
            "items": [{
                "id": "7F9619FF-8B86-D011-B42D-00C04FC964FF",
                "name": "Apples",
                "onList": true,
                "isAvailable": false,
                "quantity": 6
            }]
        }]"#;

        let records: Vec<LocationRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].visitation_order, 3);
        assert_eq!(records[0].items[0].quantity, 6);
        assert!(!records[0].items[0].is_available);
    }
}
