// Integration tests for relationship resolution
// Covers: one-to-many lists, mapped-by collections, many-to-one back links,
// joins through a non-id key, and the suppression of cyclic reloads between Fez and Bez

mod common;

use common::{Bez, Fez, Parcel, Pez, Shelf};
use relcache_core::{Model, OrmError, SessionConfig};

fn seed(conn: &relcache_store::SqliteConnection) {
    conn.raw()
        .execute_batch(
            "INSERT INTO fez (id, a) VALUES (1, 1), (2, 2);
             INSERT INTO bez (id, foreign_id) VALUES (10, 1), (11, 1), (12, 2), (13, NULL);
             INSERT INTO pez (foreign_id, color) VALUES (1, 'blue'), (1, 'green'), (1, 'yellow'), (2, 'red');",
        )
        .unwrap();
}

#[test]
fn test_mapped_by_resolves_to_color_keys() {
    let conn = common::connection();
    seed(&conn);
    let session = common::session(&conn, SessionConfig::default());

    let fez: Fez = session.service_of::<Fez>().unwrap().by_id_as(1).unwrap();
    let pez = fez.entity().mapped_as::<Pez>("pez").unwrap();
    assert_eq!(
        pez.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["blue", "green", "yellow"]
    );
    for (color, entry) in &pez {
        assert_eq!(entry.color().unwrap().as_deref(), Some(color.as_str()));
        assert_eq!(entry.foreign_id().unwrap(), Some(1));
    }
}

#[test]
fn test_one_to_many_children_link_back_to_parent() {
    let conn = common::connection();
    seed(&conn);
    let session = common::session(&conn, SessionConfig::default());

    let fez = session.service_of::<Fez>().unwrap().by_id(1).unwrap();
    assert!(fez.is_initialized());
    let children = fez.many_as::<Bez>("bez").unwrap();
    assert_eq!(
        children.iter().map(|b| b.id()).collect::<Vec<_>>(),
        vec![Some(10), Some(11)]
    );
    for child in &children {
        let parent = child.entity().one("fez").unwrap().expect("parent is set");
        assert!(parent.same_as(&fez));
    }
}

#[test]
fn test_many_to_one_first_then_parent_completes() {
    let conn = common::connection();
    seed(&conn);
    let session = common::session(&conn, SessionConfig::default());

    let bez = session.service_of::<Bez>().unwrap().by_id(12).unwrap();
    let fez = bez.one_as::<Fez>("fez").unwrap().expect("bez 12 has a parent");
    assert_eq!(fez.a().unwrap(), Some(2));
    // Loaded on behalf of Bez, so its Bez collection is still pending
    assert!(matches!(
        fez.entity().many("bez"),
        Err(OrmError::LazyFieldNotInitialized { .. })
    ));
    assert_eq!(fez.entity().mapped("pez").unwrap().len(), 1);

    let again = session.service_of::<Fez>().unwrap().by_id(2).unwrap();
    assert!(again.same_as(fez.entity()));
    let children = again.many("bez").unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0].same_as(&bez));
}

#[test]
fn test_null_foreign_key_resolves_to_none() {
    let conn = common::connection();
    seed(&conn);
    let session = common::session(&conn, SessionConfig::default());

    let bez = session.service_of::<Bez>().unwrap().by_id(13).unwrap();
    assert!(bez.one("fez").unwrap().is_none());
    assert!(bez.is_initialized());
}

#[test]
fn test_deleted_child_left_out_of_parent() {
    let conn = common::connection();
    seed(&conn);
    let session = common::session(&conn, SessionConfig::default());
    let bezs = session.service_of::<Bez>().unwrap();

    let doomed = bezs.by_id(11).unwrap();
    bezs.delete(&doomed).unwrap();
    let fez = session.service_of::<Fez>().unwrap().by_id(1).unwrap();
    let ids: Vec<_> = fez.many("bez").unwrap().iter().map(|b| b.id()).collect();
    assert_eq!(ids, vec![Some(10)]);
}

#[test]
fn test_new_child_saved_and_seen_by_fresh_session() {
    let conn = common::connection();
    seed(&conn);
    {
        let session = common::session(&conn, SessionConfig::default());
        let child = Pez::new();
        child.set_foreign_id(Some(2)).unwrap();
        child.set_color(Some("white".to_string())).unwrap();
        session.service_of::<Pez>().unwrap().save(&child).unwrap();
        session.end_session().unwrap();
    }

    let session = common::session(&conn, SessionConfig::default());
    let fez = session.service_of::<Fez>().unwrap().by_id(2).unwrap();
    let mut colors: Vec<_> = fez.mapped("pez").unwrap().into_keys().collect();
    colors.sort();
    assert_eq!(colors, vec!["red", "white"]);
}

#[test]
fn test_many_to_one_through_non_id_key() {
    let conn = common::connection();
    conn.raw()
        .execute_batch(
            "INSERT INTO shelf (id, code) VALUES (1, 'A1'), (2, 'B2');
             INSERT INTO parcel (id, shelf_code) VALUES (5, 'A1'), (6, 'Z9');",
        )
        .unwrap();
    let session = common::session(&conn, SessionConfig::default());
    let parcels = session.service_of::<Parcel>().unwrap();

    let shelved: Parcel = parcels.by_id_as(5).unwrap();
    let shelf = shelved
        .entity()
        .one_as::<Shelf>("shelf")
        .unwrap()
        .expect("A1 names shelf 1");
    assert_eq!(shelf.id(), Some(1));
    assert_eq!(shelf.code().unwrap().as_deref(), Some("A1"));

    let orphan: Parcel = parcels.by_id_as(6).unwrap();
    assert!(orphan.entity().one("shelf").unwrap().is_none());
    assert!(orphan.entity().is_initialized());
}
