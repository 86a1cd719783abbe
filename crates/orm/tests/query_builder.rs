mod common;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use strata_orm::prelude::*;
use strata_orm::query::{Aggregate, Filter};

use common::{create_posts_table, create_users_table, memory_db, seed_users, Post, User};

#[tokio::test]
async fn filter_group_holds_only_its_own_children() {
    let (_, db) = memory_db(4);
    let builder = db
        .table("users")
        .where_eq("active", true)
        .where_gt("age", 18i64)
        .where_lt("age", 65i64)
        .where_any(|g| g.where_like("name", "a%").where_like("name", "b%"));

    let filters = &builder.query().filters;
    assert_eq!(filters.len(), 4);
    match &filters[3] {
        Filter::Group { children, .. } => assert_eq!(children.len(), 2),
        other => panic!("expected group, got {:?}", other),
    }
}

#[tokio::test]
async fn filters_sorts_and_ranges() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 20).await;

    let names: Vec<DatabaseValue> = User::query(&db)
        .where_between("age", 20i64, 29i64)
        .order_by_desc("age")
        .limit(3)
        .pluck("name")
        .await
        .unwrap();
    assert_eq!(
        names,
        vec![
            DatabaseValue::from("user-11"),
            DatabaseValue::from("user-10"),
            DatabaseValue::from("user-9")
        ]
    );

    let page = User::query(&db).order_by("id").paginate(5, 2).all().await.unwrap();
    let ids: Vec<i64> = page.iter().filter_map(|u| u.id).collect();
    assert_eq!(ids, vec![6, 7, 8, 9, 10]);

    let nested = User::query(&db)
        .where_any(|g| g.where_eq("age", 18i64).where_all(|inner| inner.where_gte("age", 36i64).where_lt("age", 37i64)))
        .count()
        .await
        .unwrap();
    assert_eq!(nested, 2);
}

#[tokio::test]
async fn builder_is_reusable_after_execution() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 10).await;

    let adults = User::query(&db).where_gte("age", 21i64);
    let before = adults.query().clone();

    assert_eq!(adults.count().await.unwrap(), 7);
    assert_eq!(adults.all().await.unwrap().len(), 7);
    let _ = adults.sum::<i64>("age").await.unwrap();
    assert_eq!(adults.query(), &before);

    let narrowed = adults.copy().where_lt("age", 24i64);
    assert_eq!(narrowed.count().await.unwrap(), 3);
    assert_eq!(adults.count().await.unwrap(), 7);
    assert!(backend.read_count("users") >= 5);
}

#[tokio::test]
async fn chunking_delivers_every_row() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 512).await;

    let mut sizes = Vec::new();
    User::query(&db)
        .chunk(64, |chunk| {
            sizes.push(chunk.len());
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(sizes, vec![64; 8]);
    assert_eq!(sizes.iter().sum::<usize>(), 512);

    let mut sizes = Vec::new();
    User::query(&db)
        .chunk(511, |chunk| {
            sizes.push(chunk.len());
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(sizes, vec![511, 1]);
}

#[tokio::test]
async fn chunking_empty_result_yields_one_empty_chunk() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;

    let mut sizes = Vec::new();
    User::query(&db)
        .chunk(10, |chunk| {
            sizes.push(chunk.len());
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(sizes, vec![0]);

    let err = User::query(&db).chunk(0, |_| async { Ok(()) }).await.unwrap_err();
    assert!(matches!(err, ModelError::Query(_)));
}

#[tokio::test]
async fn chunk_handler_error_stops_iteration() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 30).await;

    let mut calls = 0;
    let err = User::query(&db)
        .chunk(10, |_| {
            calls += 1;
            async { Err(ModelError::Validation("stop".into())) }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn soft_deleted_rows_are_hidden_by_default() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    let users = seed_users(&db, 5).await;

    let mut gone = users[0].clone();
    gone.delete(&db).await.unwrap();
    assert!(gone.is_soft_deleted());

    User::query(&db)
        .where_eq("id", users[1].id)
        .update_all(Payload::new().set("deleted_at", Utc::now() + Duration::days(1)))
        .await
        .unwrap();

    assert_eq!(User::query(&db).count().await.unwrap(), 4);
    assert_eq!(User::query(&db).with_soft_deleted().count().await.unwrap(), 5);
    let trashed = User::query(&db).only_soft_deleted().all().await.unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id, users[0].id);

    User::query(&db).where_eq("id", users[0].id).restore_all().await.unwrap();
    assert_eq!(User::query(&db).count().await.unwrap(), 5);
}

#[tokio::test]
async fn bulk_delete_soft_deletes_and_force_delete_removes() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 6).await;

    User::query(&db).where_lt("age", 20i64).delete_all().await.unwrap();
    assert_eq!(User::query(&db).count().await.unwrap(), 4);
    assert_eq!(backend.rows("users").len(), 6);

    User::query(&db).with_soft_deleted().where_lt("age", 20i64).force_delete_all().await.unwrap();
    assert_eq!(backend.rows("users").len(), 4);
}

#[tokio::test]
async fn model_create_update_delete() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;

    let created = User::new("Ada", 36).insert(&db).await.unwrap();
    let id = created.id.expect("assigned id");
    assert!(created.created_at.is_some());

    let mut renamed = created.clone();
    renamed.name = "Ada Lovelace".to_string();
    renamed.save(&db).await.unwrap();

    let found = User::find_or_fail(&db, id).await.unwrap();
    assert_eq!(found.name, "Ada Lovelace");

    let moved = User::query(&db)
        .update(&User { id: Some(100), ..found.clone() }, Some(id))
        .await
        .unwrap();
    assert_eq!(moved.id, Some(100));
    assert!(User::find(&db, id).await.unwrap().is_none());

    moved.force_delete(&db).await.unwrap();
    assert!(User::query(&db).with_soft_deleted().find(100i64).await.unwrap().is_none());
}

#[tokio::test]
async fn save_changes_writes_only_changed_fields() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    let stored = User::new("Ada", 36).insert(&db).await.unwrap();
    let id = stored.id.unwrap();

    // a concurrent writer moves the age
    User::query(&db)
        .where_eq("id", id)
        .update_all(Payload::new().set("age", 40))
        .await
        .unwrap();

    let mut renamed = stored.clone();
    renamed.name = "Ada Lovelace".to_string();
    backend.clear_query_log();
    renamed.save_changes(&db, &stored).await.unwrap();

    let written: Vec<String> = backend.executed_queries()[0].payload[0]
        .columns()
        .map(str::to_string)
        .collect();
    assert_eq!(written, vec!["name".to_string(), "updated_at".to_string()]);

    let found = User::find_or_fail(&db, id).await.unwrap();
    assert_eq!(found.name, "Ada Lovelace");
    assert_eq!(found.age, 40);

    backend.clear_query_log();
    found.save_changes(&db, &found).await.unwrap();
    assert!(backend.executed_queries().is_empty());
}

#[tokio::test]
async fn mutations_without_identifier_fail() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;

    let unsaved = User::new("Nobody", 40);
    let err = unsaved.save(&db).await.unwrap_err();
    assert!(matches!(err, ModelError::MissingPrimaryKey { ref field, .. } if field == "id"));

    let err = User::query(&db).delete(&unsaved, true).await.unwrap_err();
    assert!(matches!(err, ModelError::MissingPrimaryKey { .. }));
}

#[tokio::test]
async fn aggregates_over_empty_sets() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;

    assert_eq!(User::query(&db).count().await.unwrap(), 0);
    let err = User::query(&db).sum::<i64>("age").await.unwrap_err();
    assert!(matches!(err, ModelError::NoAggregateResult { ref function, .. } if function == "SUM"));
    assert_eq!(User::query(&db).max_or("age", -1i64).await.unwrap(), -1);

    seed_users(&db, 4).await;
    assert_eq!(User::query(&db).sum::<i64>("age").await.unwrap(), 18 + 19 + 20 + 21);
    assert_eq!(User::query(&db).avg::<f64>("age").await.unwrap(), 19.5);
    assert_eq!(User::query(&db).min::<i64>("age").await.unwrap(), 18);
    assert!(User::query(&db).where_gt("age", 100i64).avg::<f64>("age").await.is_err());
}

#[tokio::test]
async fn count_of_distinct_projection_matches_its_rows() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    seed_users(&db, 4).await;
    User::query(&db)
        .where_lt("age", 20i64)
        .update_all(Payload::new().set("age", 20))
        .await
        .unwrap();

    let ages = db.table("users").select(&["age"]).distinct().order_by("age");
    assert_eq!(ages.all().await.unwrap().len(), 2);
    assert_eq!(ages.count().await.unwrap(), 2);
    assert_eq!(ages.clone().where_gt("age", 20i64).count().await.unwrap(), 1);
    assert_eq!(db.table("users").select(&["age"]).count().await.unwrap(), 4);
}

#[tokio::test]
async fn grouped_aggregates() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 3).await;

    let posts: Vec<Payload> = [(0usize, "a"), (0, "b"), (1, "c")]
        .iter()
        .map(|(user, title)| {
            Payload::new()
                .set("user_id", users[*user].id)
                .set("title", *title)
        })
        .collect();
    Post::query(&db).insert(posts).await.unwrap();

    let rows = db
        .table("posts")
        .group_by("user_id")
        .order_by("user_id")
        .aggregate_rows(vec![Aggregate::count("total")])
        .await
        .unwrap();
    let totals: Vec<i64> = rows
        .iter()
        .map(|row| DatabaseRowExt::get::<i64>(row, "total").unwrap())
        .collect();
    assert_eq!(totals, vec![2, 1]);
}

#[tokio::test]
async fn joins_expose_related_columns() {
    let (_, db) = memory_db(4);
    create_users_table(&db).await;
    create_posts_table(&db).await;
    let users = seed_users(&db, 2).await;
    Post::new(users[1].id.unwrap(), "hello").insert(&db).await.unwrap();

    let rows = db
        .table("posts")
        .join("users", "posts.user_id", "users.id")
        .select(&["posts.title", "users.name"])
        .all()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(DatabaseRowExt::get::<String>(&rows[0], "name").unwrap(), "user-1");

    let lonely = db
        .table("users")
        .left_join("posts", "users.id", "posts.user_id")
        .where_null("posts.id")
        .pluck("users.name")
        .await
        .unwrap();
    assert_eq!(lonely, vec![DatabaseValue::from("user-0")]);
}

#[tokio::test]
async fn unique_violation_leaves_table_untouched() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;

    let rows = vec![
        Payload::new().set("name", "a").set("email", "dup@example.com").set("age", 1i64),
        Payload::new().set("name", "b").set("email", "dup@example.com").set("age", 2i64),
    ];
    let err = User::query(&db).insert(rows).await.unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
    assert!(backend.rows("users").is_empty());
}

#[tokio::test]
async fn statements_reach_the_query_logger() {
    let backend = strata_orm::MemoryBackend::new();
    let logger = strata_orm::CollectingQueryLogger::new();
    let db = Database::with_logger(
        std::sync::Arc::new(backend),
        DatabaseConfig::default(),
        std::sync::Arc::new(logger.clone()),
    )
    .unwrap();
    create_users_table(&db).await;
    db.table("users").where_eq("name", "x").all().await.unwrap();

    let statements = logger.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1].text, "read users where name = ?");
    assert_eq!(statements[1].bindings, vec![DatabaseValue::from("x")]);
}
