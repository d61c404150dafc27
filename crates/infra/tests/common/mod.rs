//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するエンティティ生成ヘルパー。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stocker_domain::{
    backup::{ActorName, Backup, BackupId, BackupName, BackupScope, BackupType, NewBackup},
    tenant::TenantId,
};
use uuid::Uuid;

/// テスト用の固定日時
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// テナントを作成して ID を返す
pub async fn insert_tenant(pool: &PgPool, name: &str) -> TenantId {
    let tenant_id = TenantId::from_uuid(Uuid::now_v7());
    sqlx::query("INSERT INTO tenants (id, name, status) VALUES ($1, $2, 'active')")
        .bind(tenant_id.as_uuid())
        .bind(name)
        .execute(pool)
        .await
        .expect("テナント作成に失敗");
    tenant_id
}

/// デフォルト値で Pending のバックアップを作成
pub fn create_test_backup(tenant_id: &TenantId, name: &str, now: DateTime<Utc>) -> Backup {
    Backup::new(NewBackup {
        id:          BackupId::new(),
        tenant_id:   tenant_id.clone(),
        name:        BackupName::new(name).unwrap(),
        backup_type: BackupType::Full,
        scope:       BackupScope::new(true, true, false).unwrap(),
        description: Some("定期バックアップ".to_string()),
        created_by:  ActorName::new("admin").unwrap(),
        now,
    })
}
