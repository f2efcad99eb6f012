use shoplist_core::db::open_db_in_memory;
use shoplist_core::persistence::SharedDurableStore;
use shoplist_core::{
    ChangeKind, CoreConfig, EntityRef, ItemDraft, LocationDraft, ManualClock, ServiceError,
    ShoppingService, SqliteDurableStore, StoreError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

fn open_service(clock: Arc<ManualClock>) -> ShoppingService {
    let durable: SharedDurableStore = Arc::new(Mutex::new(SqliteDurableStore::new(
        open_db_in_memory().unwrap(),
    )));
    let config = CoreConfig {
        save_delay_ms: 60_000,
        ..CoreConfig::default()
    };
    ShoppingService::open(durable, &config, clock).unwrap()
}

#[test]
fn deleting_the_unknown_location_is_a_logged_no_op() {
    let service = open_service(Arc::new(ManualClock::new()));
    let unknown = service.with_store(|store| store.unknown_location().unwrap().id);
    service.upsert_item(&ItemDraft::named("Stray")).unwrap();

    assert_eq!(service.delete_location(unknown).unwrap(), None);
    assert_eq!(service.location(unknown).unwrap().id, unknown);
    assert_eq!(service.items(true).len(), 1);
}

#[test]
fn deleting_a_user_location_reports_moved_items() {
    let service = open_service(Arc::new(ManualClock::new()));
    let hardware = service
        .upsert_location(&LocationDraft::named("Hardware"))
        .unwrap();
    service
        .upsert_item(&ItemDraft::named("Nails").at(hardware))
        .unwrap();

    assert_eq!(service.delete_location(hardware).unwrap(), Some(1));
    assert!(!service.has_pending_commit());
    assert!(matches!(
        service.location(hardware).unwrap_err(),
        ServiceError::Store(StoreError::NotFound(EntityRef::Location(_)))
    ));
}

#[test]
fn missing_item_surfaces_not_found() {
    let service = open_service(Arc::new(ManualClock::new()));
    let missing = Uuid::new_v4();
    assert!(matches!(
        service.toggle_on_list(missing).unwrap_err(),
        ServiceError::Store(StoreError::NotFound(EntityRef::Item(id))) if id == missing
    ));
}

#[test]
fn purchased_sections_use_the_injected_clock() {
    let clock = Arc::new(ManualClock::new());
    let service = open_service(Arc::clone(&clock));
    let soap = service.upsert_item(&ItemDraft::named("Soap")).unwrap();
    service.toggle_on_list(soap).unwrap();

    assert_eq!(service.purchased_sections().recent.len(), 1);

    clock.advance(Duration::from_secs(30 * 24 * 60 * 60));
    let sections = service.purchased_sections();
    assert!(sections.recent.is_empty());
    assert_eq!(sections.older[0].id, soap);
}

#[test]
fn observers_see_service_mutations() {
    let service = open_service(Arc::new(ManualClock::new()));
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let subscription = service.subscribe_all(move |notice| {
        if notice.kind == ChangeKind::Created {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    service.upsert_item(&ItemDraft::named("Rice")).unwrap();
    service.upsert_item(&ItemDraft::named("Beans")).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);

    assert!(service.unsubscribe(subscription));
    service.upsert_item(&ItemDraft::named("Corn")).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn import_through_the_service_schedules_a_commit() {
    let source = open_service(Arc::new(ManualClock::new()));
    let deli = source.upsert_location(&LocationDraft::named("Deli")).unwrap();
    source.upsert_item(&ItemDraft::named("Salami").at(deli)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deli.json");
    source.export_to_path(&path).unwrap();

    let target = open_service(Arc::new(ManualClock::new()));
    target.flush().unwrap();
    assert!(!target.has_pending_commit());

    let report = target.import_from_path(&path).unwrap();
    assert_eq!(report.locations_created, 1);
    assert!(target.has_pending_commit());
    assert_eq!(target.location(deli).unwrap().name, "Deli");

    let again = target.import_from_path(&path).unwrap();
    assert!(!again.changed_store());
}

#[test]
fn invalid_config_is_rejected_at_open() {
    let durable: SharedDurableStore = Arc::new(Mutex::new(SqliteDurableStore::new(
        open_db_in_memory().unwrap(),
    )));
    let config = CoreConfig {
        purchase_history_days: 11,
        ..CoreConfig::default()
    };
    let err = ShoppingService::open(durable, &config, Arc::new(ManualClock::new())).unwrap_err();
    assert!(matches!(err, ServiceError::Config(_)));
}
