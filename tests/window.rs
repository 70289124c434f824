//! Time-window subsystem tests: range parsing through sync, overlap
//! queries, the interval index, and the filtered graph snapshot.

use jsonapi_graph::{Document, SnapshotRelation, Store, TimeRangeSpec};
use serde_json::json;

fn doc(value: serde_json::Value) -> Document {
    Document::from_value(value).unwrap()
}

/// Epoch milliseconds for 2024-05-04 at the given hour, UTC.
fn hour_ms(hour: i64) -> i64 {
    let midnight = 1_714_780_800_000; // 2024-05-04 00:00:00+00
    midnight + hour * 3_600_000
}

fn shift_range(start_hour: u32, end_hour: u32) -> serde_json::Value {
    json!(format!(
        r#"["2024-05-04 {:02}:00:00+00","2024-05-04 {:02}:00:00+00")"#,
        start_hour, end_hour
    ))
}

fn shift_store(indexed: bool) -> Store {
    let spec = if indexed {
        TimeRangeSpec::indexed("active_during")
    } else {
        TimeRangeSpec::field("active_during")
    };
    let mut store = Store::with_time_ranges([("shift", spec)]);
    store.sync(&doc(json!({
        "data": [
            { "type": "shift", "id": 1, "attributes": { "active_during": shift_range(0, 4) } },
            { "type": "shift", "id": 2, "attributes": { "active_during": shift_range(3, 8) } },
            { "type": "shift", "id": 3, "attributes": { "active_during": shift_range(8, 12) } },
            { "type": "shift", "id": 4, "attributes": { "active_during": "garbled" } },
            { "type": "shift", "id": 5 }
        ]
    })));
    store
}

fn ids(models: &[jsonapi_graph::ModelHandle]) -> Vec<String> {
    models
        .iter()
        .map(|model| model.id().unwrap().to_string())
        .collect()
}

#[test]
fn window_is_parsed_after_sync() {
    let store = shift_store(false);
    let window = store.time_window("shift", 1).unwrap();
    assert_eq!(window.start, hour_ms(0));
    assert_eq!(window.end, hour_ms(4));
}

#[test]
fn unparsable_window_excluded_from_queries_only() {
    let store = shift_store(false);
    assert!(store.time_window("shift", 4).is_none());
    assert!(store.time_window("shift", 5).is_none());

    // still visible to plain enumeration
    assert_eq!(store.find_all("shift").len(), 5);
    let hits = store.find_all_by_window("shift", Some(i64::MIN), None);
    assert_eq!(ids(&hits), ["1", "2", "3"]);
}

#[test]
fn no_bounds_behaves_as_find_all() {
    let store = shift_store(false);
    let all = store.find_all_by_window("shift", None, None);
    assert_eq!(ids(&all), ["1", "2", "3", "4", "5"]);
}

#[test]
fn overlap_includes_and_excludes_by_half_open_rule() {
    let store = shift_store(false);

    // [03:30, 09:00) overlaps shifts 2 and 3
    let hits = store.find_all_by_window(
        "shift",
        Some(hour_ms(3) + 1_800_000),
        Some(hour_ms(9)),
    );
    assert_eq!(ids(&hits), ["2", "3"]);

    // a query starting at a window's end still matches (end >= start)
    let hits = store.find_all_by_window("shift", Some(hour_ms(4)), Some(hour_ms(5)));
    assert_eq!(ids(&hits), ["1", "2"]);

    // a window starting at the query end does not (start < end)
    let hits = store.find_all_by_window("shift", Some(hour_ms(1)), Some(hour_ms(3)));
    assert_eq!(ids(&hits), ["1"]);

    // fully outside
    let hits = store.find_all_by_window("shift", Some(hour_ms(13)), Some(hour_ms(20)));
    assert!(hits.is_empty());
}

#[test]
fn missing_bounds_are_open_ended() {
    let store = shift_store(false);
    let hits = store.find_all_by_window("shift", None, Some(hour_ms(3)));
    assert_eq!(ids(&hits), ["1"]);

    let hits = store.find_all_by_window("shift", Some(hour_ms(8)), None);
    assert_eq!(ids(&hits), ["2", "3"]);
}

#[test]
fn indexed_query_agrees_with_linear_scan() {
    let linear = shift_store(false);
    let indexed = shift_store(true);

    for (start, end) in [
        (None, Some(hour_ms(3))),
        (Some(hour_ms(3) + 1_800_000), Some(hour_ms(9))),
        (Some(hour_ms(4)), Some(hour_ms(5))),
        (Some(hour_ms(8)), None),
        (Some(hour_ms(13)), Some(hour_ms(20))),
        (Some(i64::MIN), None),
    ] {
        assert_eq!(
            ids(&indexed.find_all_by_window("shift", start, end)),
            ids(&linear.find_all_by_window("shift", start, end)),
            "bounds {:?}..{:?}",
            start,
            end
        );
    }
}

#[test]
fn index_rebuilds_on_resync() {
    let mut store = shift_store(true);
    store.sync(&doc(json!({
        "data": { "type": "shift", "id": 1,
                  "attributes": { "active_during": shift_range(20, 23) } }
    })));

    let hits = store.find_all_by_window("shift", Some(hour_ms(0)), Some(hour_ms(2)));
    assert!(hits.is_empty());
    let hits = store.find_all_by_window("shift", Some(hour_ms(21)), Some(hour_ms(22)));
    assert_eq!(ids(&hits), ["1"]);
}

#[test]
fn unconfigured_type_matches_nothing_with_bounds() {
    let mut store = Store::new();
    store.sync(&doc(json!({
        "data": { "type": "article", "id": 1, "attributes": { "title": "t" } }
    })));

    assert_eq!(store.find_all_by_window("article", None, None).len(), 1);
    assert!(store
        .find_all_by_window("article", Some(0), Some(i64::MAX))
        .is_empty());
    assert!(store.time_window("article", 1).is_none());
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

fn staffed_store() -> Store {
    let mut store = Store::with_time_ranges([("shift", TimeRangeSpec::indexed("active_during"))]);
    store.sync(&doc(json!({
        "data": [
            {
                "type": "shift",
                "id": 1,
                "attributes": { "active_during": shift_range(0, 4) },
                "relationships": {
                    "worker": { "data": { "type": "user", "id": 10 } },
                    "backup": { "data": null }
                }
            },
            {
                "type": "shift",
                "id": 2,
                "attributes": { "active_during": shift_range(8, 12) },
                "relationships": {
                    "worker": { "data": { "type": "user", "id": 11 } }
                }
            }
        ],
        "included": [
            {
                "type": "user",
                "id": 10,
                "attributes": { "name": "Ana" },
                "relationships": {
                    "shifts": { "data": [
                        { "type": "shift", "id": 1 },
                        { "type": "shift", "id": 2 }
                    ] }
                }
            },
            { "type": "user", "id": 11, "attributes": { "name": "Bo" } }
        ]
    })));
    store
}

#[test]
fn snapshot_filters_queried_type_and_carries_others() {
    let store = staffed_store();
    let snapshot = store.window_snapshot("shift", Some(hour_ms(1)), Some(hour_ms(3)));

    let shifts = snapshot.all("shift");
    assert_eq!(shifts.len(), 1);
    assert_eq!(shifts[0].id().to_string(), "1");

    // other types carry through unfiltered
    assert_eq!(snapshot.all("user").len(), 2);
    assert!(snapshot.get("shift", 2).is_none());
    assert!(snapshot.get("user", 11).is_some());
}

#[test]
fn snapshot_repoints_relationships_inside_itself() {
    let store = staffed_store();
    let snapshot = store.window_snapshot("shift", Some(hour_ms(1)), Some(hour_ms(3)));

    let shift = snapshot.get("shift", 1).unwrap();
    let worker = snapshot.related(shift, "worker").unwrap();
    assert_eq!(worker.attribute("name"), Some(&json!("Ana")));

    // to-many membership is filtered to surviving records, list retained
    let ana = snapshot.get("user", 10).unwrap();
    let ana_shifts = snapshot.related_all(ana, "shifts");
    assert_eq!(ana_shifts.len(), 1);
    assert_eq!(ana_shifts[0].id().to_string(), "1");
    assert_eq!(
        ana.relation("shifts").unwrap(),
        &SnapshotRelation::Many(vec![jsonapi_graph::ResourceIdentifier::new("shift", 1)])
    );

    // explicit null carries through
    assert_eq!(shift.relation("backup"), Some(&SnapshotRelation::Empty));
}

#[test]
fn snapshot_drops_to_one_relationship_to_filtered_target() {
    let mut store =
        Store::with_time_ranges([("shift", TimeRangeSpec::indexed("active_during"))]);
    store.sync(&doc(json!({
        "data": [
            {
                "type": "shift",
                "id": 1,
                "attributes": { "active_during": shift_range(0, 4) },
                "relationships": {
                    "next": { "data": { "type": "shift", "id": 2 } }
                }
            },
            {
                "type": "shift",
                "id": 2,
                "attributes": { "active_during": shift_range(8, 12) }
            }
        ]
    })));

    let snapshot = store.window_snapshot("shift", Some(hour_ms(1)), Some(hour_ms(3)));
    let shift = snapshot.get("shift", 1).unwrap();
    assert!(shift.relation("next").is_none());
    assert!(shift.relation_names().is_empty());
}

#[test]
fn snapshot_is_detached_from_live_store() {
    let store = staffed_store();
    let snapshot = store.window_snapshot("shift", Some(hour_ms(1)), Some(hour_ms(3)));
    drop(snapshot);

    // the live graph is untouched by taking a snapshot
    assert_eq!(store.find_all("shift").len(), 2);
    let live = store.find("shift", 1).unwrap();
    assert!(live.related("worker").is_some());
    let worker = store.find("user", 10).unwrap();
    assert_eq!(worker.related_all("shifts").len(), 2);
}
