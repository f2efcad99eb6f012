//! Archive export and merge-import.
//!
//! Merge rules, per incoming location record:
//! 1. Sentinel visitation order: resolve to the local unknown location and
//!    keep all of its local fields.
//! 2. Known id: keep all local fields.
//! 3. Otherwise create the location from the record, appended after every
//!    existing user location (`max + 1`), ignoring the incoming order.
//!
//! Then, for each nested item: an id already present anywhere in the store is
//! left untouched (no field update, no relocation); any other item is created
//! and attached to the resolved location.

use super::format::{validate_records, ItemRecord, LocationRecord};
use super::{ArchiveError, ArchiveResult};
use crate::model::draft::{ItemDraft, LocationDraft};
use crate::model::location::{LocationId, UNKNOWN_LOCATION_VISITATION_ORDER};
use crate::store::entity_store::EntityStore;
use crate::store::error::StoreError;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Counts produced by one import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub locations_created: usize,
    pub locations_matched: usize,
    pub items_created: usize,
    pub items_skipped: usize,
}

impl ImportReport {
    /// Whether the import added anything to the store.
    pub fn changed_store(&self) -> bool {
        self.locations_created > 0 || self.items_created > 0
    }
}

/// Serializes every location, in visitation order, with its items by name.
pub fn export_archive(store: &EntityStore) -> Vec<LocationRecord> {
    store
        .query_locations()
        .iter()
        .map(|location| {
            let items = store
                .items_at(location.id)
                .iter()
                .map(ItemRecord::from_item)
                .collect();
            LocationRecord::from_location(location, items)
        })
        .collect()
}

/// Merges archive records into the store.
pub fn import_archive(
    store: &mut EntityStore,
    records: &[LocationRecord],
) -> ArchiveResult<ImportReport> {
    validate_records(records, |record| {
        record.visitation_order != UNKNOWN_LOCATION_VISITATION_ORDER
            && store.location(record.id).is_none()
    })?;

    let mut report = ImportReport::default();
    for record in records {
        let target = resolve_location(store, record, &mut report)?;
        for item in &record.items {
            if store.item(item.id).is_some() {
                report.items_skipped += 1;
                continue;
            }
            let draft = ItemDraft {
                id: Some(item.id),
                name: item.name.clone(),
                quantity: item.quantity,
                on_list: item.on_list,
                is_available: item.is_available,
                location: Some(target),
            };
            store.upsert_item(&draft).map_err(invalid)?;
            report.items_created += 1;
        }
    }

    info!(
        "event=archive_import module=archive status=ok locations_created={} locations_matched={} items_created={} items_skipped={}",
        report.locations_created,
        report.locations_matched,
        report.items_created,
        report.items_skipped
    );
    Ok(report)
}

/// Writes the store's archive as pretty-printed JSON.
pub fn export_to_path(store: &EntityStore, path: impl AsRef<Path>) -> ArchiveResult<usize> {
    let records = export_archive(store);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.flush()?;
    info!(
        "event=archive_export module=archive status=ok locations={}",
        records.len()
    );
    Ok(records.len())
}

/// Reads a JSON archive and merges it into the store.
pub fn import_from_path(
    store: &mut EntityStore,
    path: impl AsRef<Path>,
) -> ArchiveResult<ImportReport> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<LocationRecord> = serde_json::from_reader(reader)?;
    import_archive(store, &records)
}

fn resolve_location(
    store: &mut EntityStore,
    record: &LocationRecord,
    report: &mut ImportReport,
) -> ArchiveResult<LocationId> {
    if record.visitation_order == UNKNOWN_LOCATION_VISITATION_ORDER {
        report.locations_matched += 1;
        return Ok(store.get_or_create_unknown_location());
    }
    if store.location(record.id).is_some() {
        report.locations_matched += 1;
        return Ok(record.id);
    }

    let draft = LocationDraft {
        id: Some(record.id),
        name: record.name.clone(),
        visitation_order: Some(store.next_visitation_order()),
        color: record.color(),
    };
    let id = store.upsert_location(&draft).map_err(invalid)?;
    report.locations_created += 1;
    Ok(id)
}

fn invalid(err: StoreError) -> ArchiveError {
    ArchiveError::Invalid(err.to_string())
}
