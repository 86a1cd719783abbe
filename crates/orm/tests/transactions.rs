mod common;

use pretty_assertions::assert_eq;
use strata_orm::prelude::*;
use strata_orm::{OwnerId, PoolError};

use common::{create_users_table, memory_db, User};

#[tokio::test]
async fn committed_work_is_visible() {
    let (_, db) = memory_db(2);
    create_users_table(&db).await;

    let created = db
        .transaction(|tx| async move {
            assert!(tx.in_transaction());
            let alice = User::new("Alice", 30).insert(&tx).await?;
            User::new("Bob", 41).insert(&tx).await?;
            Ok::<_, ModelError>(alice)
        })
        .await
        .unwrap();

    assert!(created.id.is_some());
    assert!(!db.in_transaction());
    assert_eq!(User::query(&db).count().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_work_is_rolled_back() {
    let (_, db) = memory_db(2);
    create_users_table(&db).await;
    User::new("Alice", 30).insert(&db).await.unwrap();

    let err = db
        .transaction(|tx| async move {
            User::new("Bob", 41).insert(&tx).await?;
            User::query(&tx).where_eq("name", "Alice").update_all(Payload::new().set("age", 99)).await?;
            Err::<(), _>(ModelError::Validation("rejected".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));

    let users = User::all(&db).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].age, 30);
}

#[tokio::test]
async fn constraint_failure_inside_transaction_rolls_back() {
    let (backend, db) = memory_db(2);
    create_users_table(&db).await;

    let result = db
        .transaction(|tx| async move {
            User::new("Alice", 30).insert(&tx).await?;
            // same email
            User::new("alice", 31).insert(&tx).await?;
            Ok::<_, ModelError>(())
        })
        .await;
    assert!(result.is_err());
    assert!(backend.rows("users").is_empty());
}

#[tokio::test]
async fn nested_transactions_are_rejected() {
    let (_, db) = memory_db(2);
    create_users_table(&db).await;

    let err = db
        .transaction(|tx| async move {
            User::new("Alice", 30).insert(&tx).await?;
            tx.transaction(|_inner| async move { Ok(()) }).await
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Transaction(_)));
    assert_eq!(User::query(&db).count().await.unwrap(), 0);
}

#[tokio::test]
async fn transaction_pins_one_connection() {
    let (backend, db) = memory_db(4);
    create_users_table(&db).await;
    let opened = backend.connections_opened();

    db.transaction(|tx| async move {
        let pinned = tx.connection().await?;
        for n in 0..5 {
            User::new(&format!("user-{}", n), 20).insert(&tx).await?;
            assert!(tx.connection().await?.same_as(&pinned));
        }
        Ok::<_, ModelError>(())
    })
    .await
    .unwrap();
    // one connection of its own for the transaction, none per statement
    assert_eq!(backend.connections_opened(), opened + 1);
}

#[tokio::test]
async fn open_transaction_keeps_its_connection_from_other_owners() {
    let (backend, db) = memory_db(1);
    create_users_table(&db).await;
    let outsider = db.for_owner(OwnerId::unique());
    let inside = outsider.clone();

    db.transaction(|tx| async move {
        User::new("Alice", 30).insert(&tx).await?;
        let err = inside.connection().await.unwrap_err();
        assert!(matches!(err, ModelError::Pool(PoolError::AcquisitionFailed(_))));
        Ok::<_, ModelError>(())
    })
    .await
    .unwrap();

    assert!(outsider.connection().await.is_ok());
    assert_eq!(User::query(&outsider).count().await.unwrap(), 1);
    assert_eq!(backend.connections_opened(), 1);
}

#[tokio::test]
async fn rollback_leaves_other_owners_work_alone() {
    let (_, db) = memory_db(2);
    create_users_table(&db).await;
    let outsider = db.for_owner(OwnerId::unique());
    let inside = outsider.clone();

    let result = db
        .transaction(|tx| async move {
            User::new("Alice", 30).insert(&tx).await?;
            let other = inside.connection().await?;
            assert!(!other.same_as(&tx.connection().await?));
            User::new("Bob", 41).insert(&inside).await?;
            Err::<(), _>(ModelError::Validation("rejected".to_string()))
        })
        .await;
    assert!(result.is_err());

    let names: Vec<String> = User::all(&db).await.unwrap().into_iter().map(|u| u.name).collect();
    assert_eq!(names, vec!["Bob".to_string()]);
}
