//! BackupRepository 統合テスト
//!
//! テナント分離、楽観的ロック、トランザクションの原子性を検証する。
//!
//! 実行方法:
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p stocker-infra --test backup_repository_test -- --ignored
//! ```

mod common;

use chrono::Duration;
use common::{create_test_backup, insert_tenant, test_now};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use stocker_domain::backup::{BackupFilter, BackupOutcome, BackupStatus};
use stocker_infra::{
    db::{PgTransactionManager, TransactionManager},
    repository::{BackupRepository, PostgresBackupRepository},
};
use stocker_shared::PageRequest;

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_挿入したバックアップを取得できる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let backup = create_test_backup(&tenant_id, "nightly", test_now());

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.insert(&mut tx, &backup).await.unwrap();
    tx.commit().await.unwrap();

    let found = repo.find_by_id(backup.id(), &tenant_id).await.unwrap();
    assert_eq!(found, Some(backup));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_他テナントのバックアップは取得できない(pool: PgPool) {
    let owner = insert_tenant(&pool, "Acme").await;
    let other = insert_tenant(&pool, "Globex").await;
    let repo = PostgresBackupRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let backup = create_test_backup(&owner, "nightly", test_now());

    let mut tx = tx_manager.begin(&owner).await.unwrap();
    repo.insert(&mut tx, &backup).await.unwrap();
    tx.commit().await.unwrap();

    assert!(repo.find_by_id(backup.id(), &other).await.unwrap().is_none());
    let page = repo
        .find_page(&other, &BackupFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_count(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_ロールバックされた挿入は残らない(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let backup = create_test_backup(&tenant_id, "nightly", test_now());

    {
        let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
        repo.insert(&mut tx, &backup).await.unwrap();
    }

    assert!(repo.find_by_id(backup.id(), &tenant_id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_バージョン不一致の更新はconflictになる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let backup = create_test_backup(&tenant_id, "nightly", test_now());
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.insert(&mut tx, &backup).await.unwrap();
    tx.commit().await.unwrap();

    let completed = backup
        .clone()
        .record_outcome(
            BackupOutcome::Completed {
                size_in_bytes: 1024,
            },
            test_now() + Duration::minutes(5),
        )
        .unwrap();

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    let error = repo
        .update_with_version_check(&mut tx, &completed, backup.version() + 1)
        .await
        .unwrap_err();
    assert!(error.as_conflict().is_some());

    repo
        .update_with_version_check(&mut tx, &completed, backup.version())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stored = repo.find_by_id(backup.id(), &tenant_id).await.unwrap().unwrap();
    assert_eq!(stored.status(), BackupStatus::Completed);
    assert_eq!(stored.version(), completed.version());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_検索と統計がテナント内で集計される(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    for (i, name) in ["nightly", "weekly", "Nightly-archive"].iter().enumerate() {
        let backup = create_test_backup(&tenant_id, name, test_now() + Duration::hours(i as i64));
        repo.insert(&mut tx, &backup).await.unwrap();
    }
    tx.commit().await.unwrap();

    let filter = BackupFilter {
        search: Some("nightly".to_string()),
        sort_descending: true,
        ..Default::default()
    };
    let page = repo
        .find_page(&tenant_id, &filter, PageRequest::default())
        .await
        .unwrap();
    let names: Vec<&str> = page.items().iter().map(|b| b.name().as_str()).collect();
    assert_eq!(names, vec!["Nightly-archive", "nightly"]);

    let stats = repo.statistics(&tenant_id).await.unwrap();
    assert_eq!(stats.total_backups, 3);
    assert_eq!(stats.pending_backups, 3);
}
