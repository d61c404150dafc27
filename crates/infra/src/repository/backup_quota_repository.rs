//! # BackupQuotaRepository
//!
//! テナントの月間バックアップ枠の永続化を担当するリポジトリ。
//!
//! 枠の保存は楽観的ロックで行う。読み取り後に他のトランザクションが枠を
//! 更新していた場合は `InfraError::conflict` を返し、上限を超えた消費を防ぐ。

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use stocker_domain::{backup_quota::BackupQuota, tenant::TenantId};
use uuid::Uuid;

use crate::{
    db::{TenantConnection, TxContext},
    error::InfraError,
};

/// バックアップ枠リポジトリトレイト
#[async_trait]
pub trait BackupQuotaRepository: Send + Sync {
    /// テナントの枠を取得する（未設定なら `None`）
    async fn find_by_tenant(&self, tenant_id: &TenantId) -> Result<Option<BackupQuota>, InfraError>;

    /// バージョンを検査して枠を保存する
    ///
    /// `expected_version` が 0 なら新規作成、それ以外は読み取り時のバージョンと
    /// 一致する場合だけ更新する。作成済み・不一致の場合は `Conflict`。
    async fn save_with_version_check(
        &self,
        tx: &mut TxContext,
        quota: &BackupQuota,
        expected_version: u32,
    ) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct BackupQuotaRow {
    tenant_id:             Uuid,
    max_backups_per_month: i32,
    used_this_period:      i32,
    period_start:          NaiveDate,
    version:               i32,
}

impl From<BackupQuotaRow> for BackupQuota {
    fn from(row: BackupQuotaRow) -> Self {
        BackupQuota::from_db(
            TenantId::from_uuid(row.tenant_id),
            row.max_backups_per_month.max(0) as u32,
            row.used_this_period.max(0) as u32,
            row.period_start,
            row.version.max(0) as u32,
        )
    }
}

/// PostgreSQL 実装の BackupQuotaRepository
#[derive(Debug, Clone)]
pub struct PostgresBackupQuotaRepository {
    pool: PgPool,
}

impl PostgresBackupQuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackupQuotaRepository for PostgresBackupQuotaRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id))]
    async fn find_by_tenant(&self, tenant_id: &TenantId) -> Result<Option<BackupQuota>, InfraError> {
        let mut conn = TenantConnection::acquire(&self.pool, tenant_id).await?;

        let row = sqlx::query_as::<_, BackupQuotaRow>(
            r#"
            SELECT tenant_id, max_backups_per_month, used_this_period, period_start, version
            FROM backup_quotas
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(BackupQuota::from))
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(tenant_id = %quota.tenant_id(), expected_version = expected_version)
    )]
    async fn save_with_version_check(
        &self,
        tx: &mut TxContext,
        quota: &BackupQuota,
        expected_version: u32,
    ) -> Result<(), InfraError> {
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO backup_quotas
                    (tenant_id, max_backups_per_month, used_this_period, period_start, version)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id) DO NOTHING
                "#,
            )
            .bind(quota.tenant_id().as_uuid())
            .bind(quota.max_backups_per_month() as i32)
            .bind(quota.used_this_period() as i32)
            .bind(quota.period_start())
            .bind(quota.version() as i32)
            .execute(tx.conn())
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE backup_quotas
                SET max_backups_per_month = $2,
                    used_this_period = $3,
                    period_start = $4,
                    version = $5
                WHERE tenant_id = $1 AND version = $6
                "#,
            )
            .bind(quota.tenant_id().as_uuid())
            .bind(quota.max_backups_per_month() as i32)
            .bind(quota.used_this_period() as i32)
            .bind(quota.period_start())
            .bind(quota.version() as i32)
            .bind(expected_version as i32)
            .execute(tx.conn())
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "BackupQuota",
                quota.tenant_id().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn row(max: i32, used: i32, version: i32) -> BackupQuotaRow {
        BackupQuotaRow {
            tenant_id: Uuid::now_v7(),
            max_backups_per_month: max,
            used_this_period: used,
            period_start: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            version,
        }
    }

    #[rstest]
    #[case::通常の値(30, 4, 7, (30, 4, 7))]
    #[case::上限0(0, 0, 1, (0, 0, 1))]
    #[case::負の値は0に丸める(-1, -5, -2, (0, 0, 0))]
    fn test_行から枠を復元する(
        #[case] max: i32,
        #[case] used: i32,
        #[case] version: i32,
        #[case] expected: (u32, u32, u32),
    ) {
        let quota = BackupQuota::from(row(max, used, version));

        assert_eq!(
            (
                quota.max_backups_per_month(),
                quota.used_this_period(),
                quota.version()
            ),
            expected
        );
        assert_eq!(
            quota.period_start(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }
}
