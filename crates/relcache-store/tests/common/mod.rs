#![allow(dead_code)]

use std::rc::Rc;

use relcache_core::{model, ManyToOne, OneToMany, Session, SessionConfig};
use relcache_store::SqliteConnection;

pub const SCHEMA: &str = "
    CREATE TABLE foo (id INTEGER PRIMARY KEY AUTOINCREMENT, a INTEGER, b TEXT);
    CREATE TABLE bar (not_id INTEGER PRIMARY KEY AUTOINCREMENT, c INTEGER, d TEXT);
    CREATE TABLE fez (id INTEGER PRIMARY KEY AUTOINCREMENT, a INTEGER);
    CREATE TABLE bez (id INTEGER PRIMARY KEY AUTOINCREMENT, foreign_id INTEGER);
    CREATE TABLE pez (id INTEGER PRIMARY KEY AUTOINCREMENT, foreign_id INTEGER, color TEXT);
    CREATE TABLE shelf (id INTEGER PRIMARY KEY AUTOINCREMENT, code TEXT UNIQUE);
    CREATE TABLE parcel (id INTEGER PRIMARY KEY AUTOINCREMENT, shelf_code TEXT);
";

model! {
    /// Plain entity with two eager columns
    pub struct Foo {
        a: Option<i64>,
        b: Option<String>,
    }
}

model! {
    /// Non-default id column, a lazy column and a transient attribute
    pub struct Bar {
        c: Option<i64>,
        d: Option<String>,
        other: Option<i64>,
    }
    describe |meta| meta.id_column("not_id").lazy("d").transient("other")
}

model! {
    /// Parent of both Bez and Pez
    pub struct Fez {
        a: Option<i64>,
    }
    describe |meta| meta
        .one_to_many("bez", OneToMany::new("Bez", "id", "foreign_id"))
        .one_to_many("pez", OneToMany::new("Pez", "id", "foreign_id").mapped_by("color"))
}

model! {
    pub struct Bez {
        foreign_id: Option<i64>,
    }
    describe |meta| meta.many_to_one("fez", ManyToOne::new("Fez", "foreign_id", "id"))
}

model! {
    pub struct Pez {
        foreign_id: Option<i64>,
        color: Option<String>,
    }
}

model! {
    /// Referenced by its `code` rather than its id
    pub struct Shelf {
        code: Option<String>,
    }
}

model! {
    pub struct Parcel {
        shelf_code: Option<String>,
    }
    describe |meta| meta.many_to_one("shelf", ManyToOne::new("Shelf", "shelf_code", "code"))
}

/// Connection with the test schema applied
pub fn connection() -> Rc<SqliteConnection> {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.raw().execute_batch(SCHEMA).unwrap();
    Rc::new(conn)
}

/// Session over `conn` with every test model registered
pub fn session(conn: &Rc<SqliteConnection>, config: SessionConfig) -> Session {
    let session = Session::new(conn.clone(), config).unwrap();
    session
        .register::<Foo>()
        .unwrap()
        .register::<Bar>()
        .unwrap()
        .register::<Fez>()
        .unwrap()
        .register::<Bez>()
        .unwrap()
        .register::<Pez>()
        .unwrap()
        .register::<Shelf>()
        .unwrap()
        .register::<Parcel>()
        .unwrap();
    session
}

/// Count rows of `table` matching a raw SQL condition
pub fn count(conn: &SqliteConnection, table: &str, condition: &str) -> i64 {
    conn.raw()
        .query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {}", table, condition),
            [],
            |row| row.get(0),
        )
        .unwrap()
}
