use rusqlite::Connection;
use shoplist_core::clock::system_clock;
use shoplist_core::db::schema::{current_user_version, latest_version};
use shoplist_core::db::{open_db, open_db_in_memory, DbError};
use shoplist_core::repo::item_repo::{ItemListQuery, ItemRepository, SqliteItemRepository};
use shoplist_core::repo::location_repo::{
    LocationListQuery, LocationRepository, SqliteLocationRepository,
};
use shoplist_core::{
    CoreConfig, DurableStore, EntityRef, EntityStore, Item, ItemDraft, Location, LocationDraft,
    RepoError, Rgba, ShoppingService, SqliteDurableStore, UNKNOWN_LOCATION_VISITATION_ORDER,
};
use uuid::Uuid;

fn user_location(name: &str, order: i32) -> Location {
    Location {
        id: Uuid::new_v4(),
        name: name.to_string(),
        visitation_order: order,
        color: Rgba::NEW_LOCATION,
    }
}

#[test]
fn fresh_database_is_at_latest_layout() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
}

#[test]
fn database_from_newer_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    }

    let err = open_db(&path).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion { db_version: 99, .. }
    ));
}

#[test]
fn location_repository_orders_and_filters() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLocationRepository::new(&conn);
    let unknown = Location::unknown();
    let late = user_location("Late", 5);
    let early = user_location("Early", 2);
    for location in [&unknown, &late, &early] {
        repo.upsert_location(location).unwrap();
    }

    let all = repo.list_locations(&LocationListQuery::default()).unwrap();
    let names: Vec<_> = all.iter().map(|location| location.name.as_str()).collect();
    assert_eq!(names, vec!["Early", "Late", "Unknown Location"]);

    let user = repo
        .list_locations(&LocationListQuery { user_only: true })
        .unwrap();
    assert_eq!(user.len(), 2);

    let mut renamed = early.clone();
    renamed.name = "Earliest".to_string();
    repo.upsert_location(&renamed).unwrap();
    assert_eq!(repo.get_location(early.id).unwrap().unwrap(), renamed);

    repo.delete_location(late.id).unwrap();
    assert!(matches!(
        repo.delete_location(late.id).unwrap_err(),
        RepoError::NotFound(EntityRef::Location(id)) if id == late.id
    ));
}

#[test]
fn item_repository_filters_by_list_state_and_location() {
    let conn = open_db_in_memory().unwrap();
    let aisle = user_location("Aisle", 1);
    SqliteLocationRepository::new(&conn)
        .upsert_location(&aisle)
        .unwrap();
    let repo = SqliteItemRepository::new(&conn);

    let mut bought = Item::new("Apples", aisle.id);
    bought.on_list = false;
    bought.date_last_purchased = Some(1_700_000_000_000);
    let wanted = Item::new("Bananas", Uuid::new_v4());
    repo.upsert_item(&bought).unwrap();
    repo.upsert_item(&wanted).unwrap();

    let on_list = repo
        .list_items(&ItemListQuery {
            on_list: Some(true),
            ..ItemListQuery::default()
        })
        .unwrap();
    assert_eq!(on_list.len(), 1);
    assert_eq!(on_list[0].item.name, "Bananas");

    let at_aisle = repo
        .list_items(&ItemListQuery {
            location: Some(aisle.id),
            ..ItemListQuery::default()
        })
        .unwrap();
    assert_eq!(at_aisle.len(), 1);
    assert_eq!(at_aisle[0].item, bought);
    assert_eq!(at_aisle[0].location, Some(aisle.id));

    let mut invalid = Item::new("Cherries", aisle.id);
    invalid.quantity = 0;
    assert!(matches!(
        repo.upsert_item(&invalid).unwrap_err(),
        RepoError::Validation(_)
    ));
}

#[test]
fn loading_heals_duplicate_sentinels_and_dangling_items() {
    let conn = open_db_in_memory().unwrap();
    let first_unknown = Location::unknown();
    let second_unknown = Location::unknown();
    {
        let locations = SqliteLocationRepository::new(&conn);
        locations.upsert_location(&first_unknown).unwrap();
        locations.upsert_location(&second_unknown).unwrap();
        let items = SqliteItemRepository::new(&conn);
        items
            .upsert_item(&Item::new("Orphan", Uuid::new_v4()))
            .unwrap();
        items
            .upsert_item(&Item::new("Stranded", second_unknown.id))
            .unwrap();
    }
    conn.execute(
        "INSERT INTO items (uuid, name, quantity, on_list, is_available, location_uuid)
         VALUES (?1, 'Nowhere', 1, 1, 1, NULL);",
        [Uuid::new_v4().to_string()],
    )
    .unwrap();

    let mut durable = SqliteDurableStore::new(conn);
    let mut store = EntityStore::load(durable.load_graph().unwrap(), system_clock());

    let survivor = first_unknown.id.min(second_unknown.id);
    assert_eq!(store.count_locations(), 1);
    assert_eq!(store.unknown_location().unwrap().id, survivor);
    assert_eq!(store.item_count(survivor), 3);
    assert!(store.has_changes());

    durable.commit(&store.take_changes()).unwrap();
    let reloaded = EntityStore::load(durable.load_graph().unwrap(), system_clock());
    assert!(!reloaded.has_changes());
    assert_eq!(reloaded.snapshot(), store.snapshot());
    assert_eq!(
        reloaded
            .query_locations()
            .iter()
            .filter(|location| location.visitation_order == UNKNOWN_LOCATION_VISITATION_ORDER)
            .count(),
        1
    );
}

#[test]
fn service_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shopping.sqlite3");
    let config = CoreConfig::default();

    let (dairy, milk) = {
        let service = ShoppingService::open_sqlite(&path, &config).unwrap();
        let dairy = service
            .upsert_location(&LocationDraft::named("Dairy"))
            .unwrap();
        let milk = service
            .upsert_item(&ItemDraft::named("Milk").at(dairy))
            .unwrap();
        let cream = service
            .upsert_item(&ItemDraft::named("Cream").at(dairy))
            .unwrap();
        service.toggle_on_list(milk).unwrap();
        service.delete_item(cream).unwrap();
        assert!(!service.has_pending_commit());
        (dairy, milk)
    };

    let service = ShoppingService::open_sqlite(&path, &config).unwrap();
    assert!(!service.has_pending_commit());
    let item = service.item(milk).unwrap();
    assert_eq!(item.location, dairy);
    assert!(!item.on_list);
    assert!(item.date_last_purchased.is_some());
    assert_eq!(service.items(true).len(), 0);
    assert_eq!(service.items(false).len(), 1);
    assert_eq!(service.locations().len(), 2);
}

#[test]
fn dropping_the_service_flushes_debounced_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shopping.sqlite3");
    let config = CoreConfig {
        save_delay_ms: 60_000,
        ..CoreConfig::default()
    };

    {
        let service = ShoppingService::open_sqlite(&path, &config).unwrap();
        service.upsert_item(&ItemDraft::named("Tea")).unwrap();
        assert!(service.has_pending_commit());
    }

    let service = ShoppingService::open_sqlite(&path, &config).unwrap();
    assert_eq!(service.items(true).len(), 1);
}
