//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use strata_orm::prelude::*;
use strata_orm::{DatabaseConfig, MemoryBackend};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Memory-backed database plus the backend handle for instrumentation
pub fn memory_db(max_connections: usize) -> (MemoryBackend, Database) {
    init_tracing();
    let backend = MemoryBackend::new();
    let config = DatabaseConfig::default()
        .with_name("test")
        .with_max_connections(max_connections);
    let db = Database::new(Arc::new(backend.clone()), config).expect("database");
    (backend, db)
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            age,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

impl FromRow for User {
    fn from_row(row: &dyn DatabaseRow) -> OrmResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            age: row.get("age")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl Model for User {
    type PrimaryKey = i64;

    fn table_name() -> &'static str {
        "users"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn uses_timestamps() -> bool {
        true
    }

    fn uses_soft_deletes() -> bool {
        true
    }

    fn set_created_at(&mut self, timestamp: DateTime<Utc>) {
        self.created_at = Some(timestamp);
    }

    fn set_updated_at(&mut self, timestamp: DateTime<Utc>) {
        self.updated_at = Some(timestamp);
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, timestamp: Option<DateTime<Utc>>) {
        self.deleted_at = timestamp;
    }

    fn to_fields(&self) -> Payload {
        Payload::new()
            .set("id", self.id)
            .set("name", self.name.as_str())
            .set("email", self.email.as_str())
            .set("age", self.age)
            .set("created_at", self.created_at)
            .set("updated_at", self.updated_at)
            .set("deleted_at", self.deleted_at)
    }

    fn relationship(name: &str) -> Option<Relationship> {
        match name {
            "posts" => Some(Relationship::has_many::<Post>("posts", "user_id")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
}

impl Post {
    pub fn new(user_id: i64, title: &str) -> Self {
        Self {
            id: None,
            user_id,
            title: title.to_string(),
        }
    }
}

impl FromRow for Post {
    fn from_row(row: &dyn DatabaseRow) -> OrmResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
        })
    }
}

impl Model for Post {
    type PrimaryKey = i64;

    fn table_name() -> &'static str {
        "posts"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn to_fields(&self) -> Payload {
        Payload::new()
            .set("id", self.id)
            .set("user_id", self.user_id)
            .set("title", self.title.as_str())
    }

    fn relationship(name: &str) -> Option<Relationship> {
        match name {
            "author" => Some(Relationship::belongs_to::<User>("author", "user_id")),
            _ => None,
        }
    }
}

pub async fn create_users_table(db: &Database) {
    db.schema()
        .create("users", |t| {
            t.increments("id");
            t.string("name", Some(100));
            t.string("email", Some(255)).unique();
            t.big_integer("age");
            t.timestamps();
            t.soft_deletes();
        })
        .await
        .expect("create users");
}

pub async fn create_posts_table(db: &Database) {
    db.schema()
        .create("posts", |t| {
            t.increments("id");
            t.big_integer("user_id");
            t.string("title", None);
            t.foreign("user_id")
                .references("users", "id")
                .on_delete(ReferentialAction::Cascade);
        })
        .await
        .expect("create posts");
}

/// Insert `count` users named `user-<n>` with ages cycling through 18..68
pub async fn seed_users(db: &Database, count: usize) -> Vec<User> {
    let rows: Vec<Payload> = (0..count)
        .map(|n| {
            Payload::new()
                .set("name", format!("user-{}", n))
                .set("email", format!("user-{}@example.com", n))
                .set("age", 18 + (n as i64 % 50))
        })
        .collect();
    User::query(db).insert(rows).await.expect("seed users")
}
