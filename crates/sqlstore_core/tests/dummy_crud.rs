mod common;

use common::{fixtures, open_in_memory, Dummy, DummyFilter};
use sqlstore_core::{PagingParams, PersistenceError, Row};

#[test]
fn create_then_get_by_id_returns_equal_item() {
    let persistence = open_in_memory();
    let input = Dummy::new("A", "generated id");

    let created = persistence.create(None, &input).unwrap();
    assert!(input.id.is_none());
    let id = created.id.clone().unwrap();
    assert_eq!(id.len(), 32);

    let loaded = persistence.get_one_by_id(None, &id).unwrap().unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn create_preserves_caller_supplied_id() {
    let persistence = open_in_memory();
    let created = persistence
        .create(None, &Dummy::with_id("custom", "A", "x"))
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("custom"));
}

#[test]
fn missing_id_lookup_returns_none() {
    let persistence = open_in_memory();
    assert!(persistence
        .get_one_by_id(None, &"absent".to_string())
        .unwrap()
        .is_none());
}

#[test]
fn duplicate_primary_key_surfaces_driver_error() {
    let persistence = open_in_memory();
    let item = Dummy::with_id("1", "A", "first");
    persistence.create(None, &item).unwrap();

    let err = persistence.create(None, &item).unwrap_err();
    assert!(matches!(err, PersistenceError::Sqlite(_)));
}

#[test]
fn set_is_idempotent_for_same_data() {
    let persistence = open_in_memory();
    let item = Dummy::with_id("1", "A", "first");

    let once = persistence.set(None, &item).unwrap().unwrap();
    let twice = persistence.set(None, &item).unwrap().unwrap();

    assert_eq!(once, item);
    assert_eq!(twice, once);
    assert_eq!(
        persistence
            .get_count_by_filter(None, &DummyFilter::default())
            .unwrap(),
        1
    );
}

#[test]
fn set_overwrites_and_generates_missing_ids() {
    let persistence = open_in_memory();
    persistence
        .set(None, &Dummy::with_id("1", "A", "first"))
        .unwrap();

    let overwritten = persistence
        .set(None, &Dummy::with_id("1", "A", "rewritten"))
        .unwrap()
        .unwrap();
    assert_eq!(overwritten.content, "rewritten");

    let generated = persistence
        .set(None, &Dummy::new("B", "new"))
        .unwrap()
        .unwrap();
    assert!(generated.id.is_some());
    assert_ne!(generated.id.as_deref(), Some("1"));
}

#[test]
fn update_replaces_existing_row() {
    let persistence = open_in_memory();
    let created = persistence
        .create(None, &Dummy::new("A", "before"))
        .unwrap();

    let mut changed = created.clone();
    changed.content = "after".to_string();
    let updated = persistence.update(None, &changed).unwrap().unwrap();

    assert_eq!(updated, changed);
    let id = created.id.unwrap();
    assert_eq!(
        persistence.get_one_by_id(None, &id).unwrap().unwrap().content,
        "after"
    );
}

#[test]
fn update_of_missing_id_returns_none_and_leaves_table_unchanged() {
    let persistence = open_in_memory();
    for item in fixtures() {
        persistence.create(None, &item).unwrap();
    }

    let ghost = Dummy::with_id("404", "Z", "nothing");
    assert!(persistence.update(None, &ghost).unwrap().is_none());
    assert!(persistence.update(None, &Dummy::new("A", "no id")).unwrap().is_none());

    let all = persistence
        .get_page_by_filter(None, &DummyFilter::default(), None)
        .unwrap();
    let mut stored = all.data;
    stored.sort_by(|left, right| left.id.cmp(&right.id));
    assert_eq!(stored, fixtures().to_vec());
}

#[test]
fn update_partially_changes_only_given_columns() {
    let persistence = open_in_memory();
    persistence
        .create(None, &Dummy::with_id("1", "A", "first"))
        .unwrap();

    let fields = Row::new().with("content", "patched".to_string());
    let updated = persistence
        .update_partially(None, &"1".to_string(), &fields)
        .unwrap()
        .unwrap();

    assert_eq!(updated.key, "A");
    assert_eq!(updated.content, "patched");
    assert!(persistence
        .update_partially(None, &"1".to_string(), &Row::new())
        .unwrap()
        .is_none());
}

#[test]
fn delete_by_id_returns_previous_item() {
    let persistence = open_in_memory();
    let created = persistence
        .create(None, &Dummy::with_id("1", "A", "first"))
        .unwrap();

    let deleted = persistence
        .delete_by_id(None, &"1".to_string())
        .unwrap()
        .unwrap();
    assert_eq!(deleted, created);
    assert!(persistence
        .get_one_by_id(None, &"1".to_string())
        .unwrap()
        .is_none());
    assert!(persistence
        .delete_by_id(None, &"1".to_string())
        .unwrap()
        .is_none());
}

#[test]
fn ids_scenario_lists_counts_and_deletes() {
    let persistence = open_in_memory();
    for item in fixtures() {
        persistence.create(None, &item).unwrap();
    }

    let listed = persistence
        .get_list_by_ids(None, &["1".to_string(), "3".to_string()])
        .unwrap();
    let mut ids = listed
        .iter()
        .filter_map(|item| item.id.clone())
        .collect::<Vec<_>>();
    ids.sort();
    assert_eq!(ids, vec!["1".to_string(), "3".to_string()]);

    assert_eq!(
        persistence
            .get_count_by_filter(None, &DummyFilter::key("A"))
            .unwrap(),
        2
    );

    persistence
        .delete_by_ids(None, &["1".to_string(), "2".to_string()])
        .unwrap();
    let page = persistence
        .get_page_by_filter(
            None,
            &DummyFilter::default(),
            Some(&PagingParams::new(None, None, true)),
        )
        .unwrap();
    assert_eq!(page.total, Some(1));
    assert_eq!(page.data[0].id.as_deref(), Some("3"));
}

#[test]
fn empty_id_lists_issue_no_statements() {
    let persistence = open_in_memory();
    let client = persistence.client().unwrap();
    let before = client.executed_statements();

    assert!(persistence.get_list_by_ids(None, &[]).unwrap().is_empty());
    persistence.delete_by_ids(None, &[]).unwrap();

    assert_eq!(client.executed_statements(), before);
}

#[test]
fn random_item_respects_filter() {
    let persistence = open_in_memory();
    assert!(persistence.get_one_random(None, None).unwrap().is_none());

    for item in fixtures() {
        persistence.create(None, &item).unwrap();
    }
    for _ in 0..10 {
        let picked = persistence
            .get_one_random(None, Some("\"key\"='B'"))
            .unwrap()
            .unwrap();
        assert_eq!(picked.id.as_deref(), Some("2"));
    }
}

#[test]
fn delete_by_filter_and_clear() {
    let persistence = open_in_memory();
    for item in fixtures() {
        persistence.create(None, &item).unwrap();
    }

    persistence.delete_by_filter(None, Some("\"key\"='A'")).unwrap();
    let remaining = persistence.get_list_by_filter(None, None, None, None).unwrap();
    assert_eq!(remaining, vec![Dummy::with_id("2", "B", "second")]);

    persistence.clear(None).unwrap();
    assert_eq!(
        persistence
            .get_count_by_filter(None, &DummyFilter::default())
            .unwrap(),
        0
    );
}
