use budget_calendar_core::db::open_db;
use budget_calendar_core::db::open_db_in_memory;
use budget_calendar_core::{
    is_calendar_event, CalendarEntry, Event, EventInput, EventStore, Frequency, HydrationPolicy,
    KeyValueRepository, LedgerEvent, MemoryKeyValueRepository, RecurrenceRule, RecurringEvent,
    RepoError, RepoResult, SqliteKeyValueRepository, StoreConfig, StoreError, DEFAULT_STORAGE_KEY,
};
use chrono::{NaiveDate, TimeZone, Utc};
use std::any::Any;

fn rent() -> Event {
    Event::new(&EventInput::new("2024-01-15", "Rent", -1200.5)).unwrap()
}

fn salary() -> Event {
    Event::new(&EventInput::new("2024-01-31", "Salary", 3000.0)).unwrap()
}

fn gym_membership() -> RecurringEvent {
    let input = EventInput::new("2024-01-01", "Gym", -40.0)
        .recurring()
        .with_end_date("2024-06-30");
    RecurringEvent::new(&input, RecurrenceRule::every(1, Frequency::Monthly)).unwrap()
}

/// Reads as empty and refuses every write.
struct ReadOnlyRepository;

impl KeyValueRepository for ReadOnlyRepository {
    fn get_value(&self, _key: &str) -> RepoResult<Option<String>> {
        Ok(None)
    }

    fn set_value(&self, key: &str, _value: &str) -> RepoResult<()> {
        Err(RepoError::InvalidKey(format!("read-only storage rejected `{key}`")))
    }
}

fn stored_records(repo: &impl KeyValueRepository, key: &str) -> Vec<serde_json::Value> {
    let raw = repo.get_value(key).unwrap().expect("snapshot should exist");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn empty_storage_hydrates_to_empty_store() {
    let repo = MemoryKeyValueRepository::new();
    let store = EventStore::init(&repo, StoreConfig::default()).unwrap();

    assert!(store.is_empty());
    assert_eq!(store.config().storage_key, DEFAULT_STORAGE_KEY);
    assert_eq!(repo.get_value(DEFAULT_STORAGE_KEY).unwrap(), None);
}

#[test]
fn add_event_appends_and_persists_snapshot() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();

    let rent_id = store.add_event(rent()).unwrap();
    let salary_id = store.add_event(salary()).unwrap();

    let ids = store
        .events()
        .iter()
        .map(|entry| entry.id().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![rent_id.clone(), salary_id]);

    let records = stored_records(&repo, "events");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], rent_id.as_str());
    assert_eq!(records[0]["date"], "2024-01-15T00:00:00.000Z");
    assert_eq!(records[0]["title"], "Rent");
    assert_eq!(records[0]["amount"], -1200.5);
}

#[test]
fn add_event_returns_previously_read_id() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    let event = rent();
    let known_id = event.id().unwrap().to_string();

    assert_eq!(store.add_event(event).unwrap(), known_id);
    assert!(store.find_event(&known_id).is_some());
}

#[test]
fn add_event_rejects_entry_without_date() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    let mut event = rent();
    let _ = event.set_date("bad date");

    let err = store.add_event(event).unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.is_empty());
    assert_eq!(repo.get_value("events").unwrap(), None);
}

#[test]
fn persist_failure_on_add_keeps_entry_in_memory() {
    let mut store = EventStore::init(ReadOnlyRepository, StoreConfig::default()).unwrap();

    let err = store.add_event(rent()).unwrap_err();

    assert!(matches!(err, StoreError::Repo(RepoError::InvalidKey(_))));
    assert_eq!(store.len(), 1);
    assert_eq!(store.events()[0].title(), "Rent");
}

#[test]
fn remove_event_drops_matching_entries_and_persists() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    let rent_id = store.add_event(rent()).unwrap();
    let salary_id = store.add_event(salary()).unwrap();

    assert_eq!(store.remove_event(&rent_id).unwrap(), 1);

    assert_eq!(store.len(), 1);
    let records = stored_records(&repo, "events");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], salary_id.as_str());
}

#[test]
fn removing_unknown_id_is_a_noop_that_still_writes() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();

    assert_eq!(store.remove_event("2024-01-01_missing0").unwrap(), 0);

    assert!(store.is_empty());
    assert!(stored_records(&repo, "events").is_empty());
}

#[test]
fn removing_duplicate_ids_drops_every_copy() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    let event = rent();
    let id = event.id().unwrap().to_string();
    store.add_event(event.clone()).unwrap();
    store.add_event(event).unwrap();
    store.add_event(salary()).unwrap();
    assert_eq!(store.len(), 3);

    assert_eq!(store.remove_event(&id).unwrap(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.events()[0].title(), "Salary");
}

#[test]
fn type_erased_values_must_be_calendar_events() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();

    let not_events: Vec<Box<dyn Any>> = vec![
        Box::new(serde_json::json!({"date": "2024-01-15", "title": "Rent", "amount": -10})),
        Box::new("Rent".to_string()),
        Box::new(EventInput::new("2024-01-15", "Rent", -10.0)),
    ];
    for candidate in not_events {
        assert!(!is_calendar_event(&*candidate));
        assert!(matches!(
            store.add_dyn(candidate),
            Err(StoreError::NotAnEvent)
        ));
    }
    assert!(store.is_empty());
    assert_eq!(repo.get_value("events").unwrap(), None);

    let events: Vec<Box<dyn Any>> = vec![
        Box::new(rent()),
        Box::new(gym_membership()),
        Box::new(CalendarEntry::from(salary())),
    ];
    for candidate in events {
        assert!(is_calendar_event(&*candidate));
        store.add_dyn(candidate).unwrap();
    }
    assert_eq!(store.len(), 3);
    assert!(store.events()[1].is_recurring());
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.sqlite3");

    let (rent_id, gym_id) = {
        let conn = open_db(&path).unwrap();
        let repo = SqliteKeyValueRepository::try_new(&conn).unwrap();
        let mut store = EventStore::init(repo, StoreConfig::default()).unwrap();
        let rent_id = store.add_event(rent()).unwrap();
        let gym_id = store.add_event(gym_membership()).unwrap();
        (rent_id, gym_id)
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteKeyValueRepository::try_new(&conn).unwrap();
    let store = EventStore::init(repo, StoreConfig::default()).unwrap();

    assert_eq!(store.len(), 2);
    let rent_entry = store.find_event(&rent_id).unwrap();
    assert!(!rent_entry.is_recurring());
    assert_eq!(rent_entry.amount(), -1200.5);

    let gym_entry = store.find_event(&gym_id).unwrap();
    let gym = gym_entry.as_recurring().unwrap();
    assert_eq!(gym.occurrences().unwrap().len(), 6);
    assert_eq!(
        gym.requested_end_date(),
        Some(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap())
    );
}

#[test]
fn hydration_keeps_persisted_ids_stable() {
    let snapshot = serde_json::json!([
        {
            "id": "2024-01-15_Rent1700000000000",
            "date": "2024-01-15T00:00:00.000Z",
            "title": "Rent",
            "amount": -1200.5
        },
        {"date": "2024-01-31T00:00:00.000Z", "title": "Salary", "amount": 3000}
    ]);
    let repo = MemoryKeyValueRepository::with_value("events", snapshot.to_string());

    let store = EventStore::init(&repo, StoreConfig::default()).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(
        store.events()[0].id().unwrap(),
        "2024-01-15_Rent1700000000000"
    );
    assert!(store.events()[1]
        .id()
        .unwrap()
        .starts_with("2024-01-31_Salary"));
}

#[test]
fn fail_fast_hydration_rejects_whole_snapshot() {
    let snapshot = serde_json::json!([
        {"id": "a", "date": "2024-01-15T00:00:00.000Z", "title": "Rent", "amount": -1200.5},
        {"id": "b", "date": "2024-01-16T00:00:00.000Z", "title": "   ", "amount": 10}
    ]);
    let repo = MemoryKeyValueRepository::with_value("events", snapshot.to_string());

    let err = EventStore::init(&repo, StoreConfig::default())
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StoreError::CorruptEntry { index: 1, ref message } if message.contains("`title`")
    ));
}

#[test]
fn skip_invalid_hydration_keeps_good_entries() {
    let snapshot = serde_json::json!([
        {"id": "a", "date": "2024-01-15T00:00:00.000Z", "title": "Rent", "amount": -1200.5},
        {"id": "b", "date": "not a date", "title": "Broken", "amount": 10},
        {"id": "c", "date": "2024-01-31T00:00:00.000Z", "title": "Salary", "amount": 3000}
    ]);
    let repo = MemoryKeyValueRepository::with_value("events", snapshot.to_string());
    let config = StoreConfig::default().with_hydration(HydrationPolicy::SkipInvalid);

    let store = EventStore::init(&repo, config).unwrap();

    let ids = store
        .events()
        .iter()
        .map(|entry| entry.id().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn malformed_snapshot_is_a_serialization_error() {
    let repo = MemoryKeyValueRepository::with_value("events", "not json");

    let err = EventStore::init(&repo, StoreConfig::default())
        .err()
        .unwrap();

    assert!(matches!(err, StoreError::Serialization(_)));
}

#[test]
fn custom_storage_key_isolates_snapshots() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteKeyValueRepository::try_new(&conn).unwrap();
    let config = StoreConfig::default().with_storage_key("household_events");

    let mut store = EventStore::init(&repo, config).unwrap();
    store.add_event(rent()).unwrap();

    assert_eq!(repo.get_value("events").unwrap(), None);
    assert_eq!(stored_records(&repo, "household_events").len(), 1);

    let default_store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    assert!(default_store.is_empty());
}

#[test]
fn events_on_matches_single_and_recurring_entries() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    store.add_event(rent()).unwrap();
    store.add_event(gym_membership()).unwrap();

    let march_first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let on_march_first = store.events_on(march_first).unwrap();
    assert_eq!(on_march_first.len(), 1);
    assert_eq!(on_march_first[0].title(), "Gym");

    let rent_day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let on_rent_day = store.events_on(rent_day).unwrap();
    assert_eq!(on_rent_day.len(), 1);
    assert_eq!(on_rent_day[0].title(), "Rent");

    let quiet_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    assert!(store.events_on(quiet_day).unwrap().is_empty());
}

#[test]
fn balance_accumulates_every_occurrence_up_to_date() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    store.add_event(rent()).unwrap();
    store.add_event(salary()).unwrap();
    store.add_event(gym_membership()).unwrap();

    let before_anything = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
    assert_eq!(store.balance_on(before_anything).unwrap(), 0.0);

    let mid_january = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    assert_eq!(store.balance_on(mid_january).unwrap(), -1240.5);

    let end_of_march = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
    assert_eq!(store.balance_on(end_of_march).unwrap(), 3000.0 - 1200.5 - 120.0);
}

#[test]
fn balance_counts_decades_of_daily_occurrences() {
    let input = EventInput::new("2000-01-01", "Coffee", -1.0)
        .recurring()
        .with_end_date("2040-01-01");
    let coffee = RecurringEvent::new(&input, RecurrenceRule::default()).unwrap();
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    store.add_event(coffee).unwrap();

    let until = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();

    assert_eq!(store.balance_on(until).unwrap(), -14_611.0);
}

#[test]
fn snapshot_matches_persisted_value() {
    let repo = MemoryKeyValueRepository::new();
    let mut store = EventStore::init(&repo, StoreConfig::default()).unwrap();
    store.add_event(gym_membership()).unwrap();

    let snapshot = store.snapshot().unwrap();

    assert_eq!(repo.get_value("events").unwrap().as_deref(), Some(snapshot.as_str()));
}
