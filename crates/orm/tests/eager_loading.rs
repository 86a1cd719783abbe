mod common;

use pretty_assertions::assert_eq;
use strata_orm::prelude::*;

use common::{create_posts_table, create_users_table, memory_db, seed_users, Post, User};

#[derive(Debug, Clone, PartialEq)]
struct Customer {
    code: Option<i64>,
    name: String,
}

impl FromRow for Customer {
    fn from_row(row: &dyn DatabaseRow) -> OrmResult<Self> {
        Ok(Self {
            code: row.try_get("code")?,
            name: row.get("name")?,
        })
    }
}

impl Model for Customer {
    type PrimaryKey = i64;

    fn table_name() -> &'static str {
        "customers"
    }

    fn primary_key_name() -> &'static str {
        "code"
    }

    fn primary_key(&self) -> Option<i64> {
        self.code
    }

    fn to_fields(&self) -> Payload {
        Payload::new().set("code", self.code).set("name", self.name.as_str())
    }

    fn relationship(name: &str) -> Option<Relationship> {
        match name {
            "orders" => Some(Relationship::has_many::<Order>("orders", "customer_code")),
            "latest" => Some(Relationship::has_one::<Order>("latest", "customer_code")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: Option<i64>,
    customer_code: i64,
}

impl FromRow for Order {
    fn from_row(row: &dyn DatabaseRow) -> OrmResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            customer_code: row.get("customer_code")?,
        })
    }
}

impl Model for Order {
    type PrimaryKey = i64;

    fn table_name() -> &'static str {
        "orders"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn to_fields(&self) -> Payload {
        Payload::new().set("id", self.id).set("customer_code", self.customer_code)
    }
}

async fn seed_posts(db: &Database, authors: &[i64], count: usize) {
    let rows: Vec<Payload> = (0..count)
        .map(|n| {
            Payload::new()
                .set("user_id", authors[n % authors.len()])
                .set("title", format!("post-{}", n))
        })
        .collect();
    Post::query(db).insert(rows).await.unwrap();
}

#[tokio::test]
async fn belongs_to_issues_one_query_for_distinct_parents() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 3).await;
    let ids: Vec<i64> = users.iter().filter_map(|u| u.id).collect();
    seed_posts(&db, &ids, 10).await;

    backend.clear_query_log();
    let posts = Post::query(&db).with("author").order_by("id").run().await.unwrap();

    assert_eq!(posts.len(), 10);
    assert_eq!(backend.read_count("posts"), 1);
    assert_eq!(backend.read_count("users"), 1);

    for post in &posts {
        let author: User = post.related_one("author").unwrap().expect("author");
        assert_eq!(Some(post.user_id), author.id);
    }
}

#[tokio::test]
async fn has_many_groups_children_by_parent() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 3).await;
    let ids: Vec<i64> = users.iter().filter_map(|u| u.id).take(2).collect();
    seed_posts(&db, &ids, 5).await;

    backend.clear_query_log();
    let loaded = User::query(&db).with("posts").order_by("id").run().await.unwrap();
    assert_eq!(backend.read_count("posts"), 1);

    let counts: Vec<usize> = loaded
        .iter()
        .map(|user| user.related::<Post>("posts").unwrap().len())
        .collect();
    assert_eq!(counts, vec![3, 2, 0]);
}

#[tokio::test]
async fn unrequested_relation_is_an_error() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 1).await;

    let user = User::query(&db).first_or_fail().await.unwrap();
    let err = user.related::<Post>("posts").unwrap_err();
    assert!(matches!(err, ModelError::RelationshipNotLoaded { .. }));
}

#[tokio::test]
async fn unknown_relation_fails_the_query() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 1).await;

    let err = User::query(&db).with("comments").run().await.unwrap_err();
    assert!(matches!(err, ModelError::Relationship(_)));
}

#[tokio::test]
async fn empty_parent_set_skips_follow_up_query() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;

    backend.clear_query_log();
    let users = User::query(&db).with("posts").run().await.unwrap();
    assert!(users.is_empty());
    assert_eq!(backend.read_count("posts"), 0);
}

#[tokio::test]
async fn soft_deleted_parents_are_not_eager_loaded() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 2).await;
    let ids: Vec<i64> = users.iter().filter_map(|u| u.id).collect();
    seed_posts(&db, &ids, 2).await;

    let mut first = users[0].clone();
    first.delete(&db).await.unwrap();

    let posts = Post::query(&db).with("author").order_by("id").run().await.unwrap();
    assert!(posts[0].related_one::<User>("author").unwrap().is_none());
    assert!(posts[1].related_one::<User>("author").unwrap().is_some());
}

#[tokio::test]
async fn each_run_loads_relations_afresh() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 1).await;
    let id = users[0].id.unwrap();

    let query = User::query(&db).with("posts");
    let before = query.first_or_fail().await.unwrap();
    assert!(before.related_records("posts").unwrap().is_empty());

    Post::new(id, "late").insert(&db).await.unwrap();
    backend.clear_query_log();
    let after = query.first_or_fail().await.unwrap();
    assert_eq!(after.related_records("posts").unwrap().len(), 1);
    assert_eq!(backend.read_count("posts"), 1);
}

#[tokio::test]
async fn chunks_load_relations_per_chunk() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 4).await;
    let ids: Vec<i64> = users.iter().filter_map(|u| u.id).collect();
    seed_posts(&db, &ids, 8).await;

    backend.clear_query_log();
    let mut seen = 0;
    Post::query(&db)
        .with("author")
        .chunk(3, |chunk| {
            for post in &chunk {
                assert!(post.is_loaded("author"));
            }
            seen += chunk.len();
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(seen, 8);
    assert_eq!(backend.read_count("users"), 3);
}

#[tokio::test]
async fn has_many_matches_on_the_parent_primary_key() {
    let (_, db) = memory_db(4);
    db.schema()
        .create("customers", |t| {
            t.big_integer("code").primary();
            t.string("name", None);
        })
        .await
        .unwrap();
    db.schema()
        .create("orders", |t| {
            t.increments("id");
            t.big_integer("customer_code");
        })
        .await
        .unwrap();

    let customers: Vec<Payload> = [(501i64, "Acme"), (502, "Globex")]
        .iter()
        .map(|(code, name)| Payload::new().set("code", *code).set("name", *name))
        .collect();
    Customer::query(&db).insert(customers).await.unwrap();
    let orders: Vec<Payload> = [501i64, 501, 502]
        .iter()
        .map(|code| Payload::new().set("customer_code", *code))
        .collect();
    Order::query(&db).insert(orders).await.unwrap();

    let loaded = Customer::query(&db)
        .with("orders")
        .with("latest")
        .order_by("code")
        .run()
        .await
        .unwrap();
    let counts: Vec<usize> = loaded
        .iter()
        .map(|customer| customer.related::<Order>("orders").unwrap().len())
        .collect();
    assert_eq!(counts, vec![2, 1]);

    let latest: Order = loaded[1].related_one("latest").unwrap().expect("order");
    assert_eq!(latest.customer_code, 502);
}
