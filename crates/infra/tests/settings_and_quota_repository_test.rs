//! BackupQuotaRepository / SecuritySettingsRepository 統合テスト

mod common;

use common::{insert_tenant, test_now};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use stocker_domain::{
    backup_quota::BackupQuota,
    security_settings::{PasswordPolicy, SecuritySettings, SessionPolicy},
};
use stocker_infra::{
    db::{PgTransactionManager, TransactionManager},
    repository::{
        BackupQuotaRepository,
        PostgresBackupQuotaRepository,
        PostgresSecuritySettingsRepository,
        SecuritySettingsRepository,
    },
};

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_バックアップ枠を保存して上書きできる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupQuotaRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    assert!(repo.find_by_tenant(&tenant_id).await.unwrap().is_none());

    let quota = BackupQuota::new(tenant_id.clone(), 5, test_now());
    let expected_version = quota.version();
    let consumed = quota.consume(test_now()).unwrap();
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &consumed, expected_version)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stored = repo.find_by_tenant(&tenant_id).await.unwrap();
    assert_eq!(stored, Some(consumed));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_読み取り後に更新された枠の保存はconflictになる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupQuotaRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let initial = BackupQuota::new(tenant_id.clone(), 1, test_now())
        .consume(test_now())
        .unwrap();
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &initial, 0).await.unwrap();
    tx.commit().await.unwrap();

    let read_a = repo.find_by_tenant(&tenant_id).await.unwrap().unwrap();
    let read_b = read_a.clone();
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    let bumped = BackupQuota::from_db(
        tenant_id.clone(),
        2,
        read_a.used_this_period(),
        read_a.period_start(),
        read_a.version() + 1,
    );
    repo.save_with_version_check(&mut tx, &bumped, read_a.version())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    let stale = BackupQuota::from_db(
        tenant_id.clone(),
        5,
        read_b.used_this_period(),
        read_b.period_start(),
        read_b.version() + 1,
    );
    let error = repo
        .save_with_version_check(&mut tx, &stale, read_b.version())
        .await
        .unwrap_err();

    assert_eq!(error.as_conflict(), Some(("BackupQuota", tenant_id.to_string().as_str())));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_作成済みの枠を新規として保存するとconflictになる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresBackupQuotaRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let consumed = BackupQuota::new(tenant_id.clone(), 1, test_now())
        .consume(test_now())
        .unwrap();
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &consumed, 0).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    let error = repo
        .save_with_version_check(&mut tx, &consumed, 0)
        .await
        .unwrap_err();

    assert!(error.as_conflict().is_some());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_セキュリティ設定をjsonbで保存して復元できる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresSecuritySettingsRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let policy = PasswordPolicy::new(12, true, true, true, true, 30, 10).unwrap();
    let settings =
        SecuritySettings::defaults_for(tenant_id.clone()).update_password_policy(policy, test_now());

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &settings, 0)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stored = repo.find_by_tenant(&tenant_id).await.unwrap().unwrap();
    assert_eq!(stored.password_policy(), &policy);
    assert_eq!(stored.updated_at(), Some(test_now()));
    assert_eq!(stored.version(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "PostgreSQL が必要"]
async fn test_同じバージョンから更新した設定は後の保存がconflictになる(pool: PgPool) {
    let tenant_id = insert_tenant(&pool, "Acme").await;
    let repo = PostgresSecuritySettingsRepository::new(pool.clone());
    let tx_manager = PgTransactionManager::new(pool);
    let initial = SecuritySettings::defaults_for(tenant_id.clone())
        .update_password_policy(PasswordPolicy::default(), test_now());
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &initial, 0)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let read = repo.find_by_tenant(&tenant_id).await.unwrap().unwrap();
    let password = PasswordPolicy::new(16, true, true, true, true, 60, 12).unwrap();
    let with_password = read
        .clone()
        .update_password_policy(password, test_now());
    let with_session = read
        .clone()
        .update_session_policy(SessionPolicy::new(3, 60, 15, true).unwrap(), test_now());

    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    repo.save_with_version_check(&mut tx, &with_password, read.version())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let mut tx = tx_manager.begin(&tenant_id).await.unwrap();
    let error = repo
        .save_with_version_check(&mut tx, &with_session, read.version())
        .await
        .unwrap_err();

    assert!(error.as_conflict().is_some());
    let stored = repo.find_by_tenant(&tenant_id).await.unwrap().unwrap();
    assert_eq!(stored.password_policy(), &password);
    assert_eq!(stored.session_policy(), &SessionPolicy::default());
}
