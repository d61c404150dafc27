//! # BackupRepository
//!
//! テナント単位のバックアップの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **RLS 二重防御**: 読み取りは [`TenantConnection`] で `app.tenant_id` を設定した上で、
//!   WHERE 句でも明示的にテナント条件を指定する
//! - **楽観的ロック**: 更新は `version` が一致する場合のみ成功し、
//!   不一致なら `InfraError::conflict` を返す
//! - **統計は SQL で集計**: 全件をアプリケーションに読み込まない

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use stocker_domain::{
    backup::{
        ActorName,
        Backup,
        BackupFilter,
        BackupId,
        BackupName,
        BackupRecord,
        BackupScope,
        BackupStatistics,
        BackupStatus,
        BackupType,
    },
    tenant::TenantId,
};
use stocker_shared::{PageRequest, PagedResult};
use uuid::Uuid;

use crate::{
    db::{TenantConnection, TxContext},
    error::InfraError,
};

/// バックアップリポジトリトレイト
#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// ID でバックアップを検索する（他テナントのバックアップは `None`）
    async fn find_by_id(
        &self,
        id: &BackupId,
        tenant_id: &TenantId,
    ) -> Result<Option<Backup>, InfraError>;

    /// 条件に一致するバックアップを 1 ページ分取得する
    async fn find_page(
        &self,
        tenant_id: &TenantId,
        filter: &BackupFilter,
        page: PageRequest,
    ) -> Result<PagedResult<Backup>, InfraError>;

    /// テナントのバックアップ統計を集計する
    async fn statistics(&self, tenant_id: &TenantId) -> Result<BackupStatistics, InfraError>;

    /// バックアップを挿入する
    async fn insert(&self, tx: &mut TxContext, backup: &Backup) -> Result<(), InfraError>;

    /// バージョンチェック付きでバックアップを更新する
    ///
    /// `expected_version` と DB 上のバージョンが一致しない場合は
    /// `InfraErrorKind::Conflict` を返す。
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        backup: &Backup,
        expected_version: u32,
    ) -> Result<(), InfraError>;

    /// バックアップを削除する
    async fn delete(
        &self,
        tx: &mut TxContext,
        id: &BackupId,
        tenant_id: &TenantId,
    ) -> Result<(), InfraError>;
}

const BACKUP_COLUMNS: &str = r#"
    id, tenant_id, backup_name, backup_type, status,
    includes_database, includes_files, includes_configuration,
    description, created_by, created_at, completed_at, size_in_bytes,
    is_restorable, last_restored_at, restore_count, restore_notes,
    error_message, version
"#;

#[derive(sqlx::FromRow)]
struct BackupRow {
    id:                     Uuid,
    tenant_id:              Uuid,
    backup_name:            String,
    backup_type:            String,
    status:                 String,
    includes_database:      bool,
    includes_files:         bool,
    includes_configuration: bool,
    description:            Option<String>,
    created_by:             String,
    created_at:             DateTime<Utc>,
    completed_at:           Option<DateTime<Utc>>,
    size_in_bytes:          Option<i64>,
    is_restorable:          bool,
    last_restored_at:       Option<DateTime<Utc>>,
    restore_count:          i32,
    restore_notes:          Option<String>,
    error_message:          Option<String>,
    version:                i32,
}

#[derive(sqlx::FromRow)]
struct StatisticsRow {
    total:             i64,
    completed:         i64,
    failed:            i64,
    pending:           i64,
    size:              i64,
    last_completed_at: Option<DateTime<Utc>>,
    restores:          i64,
}

impl TryFrom<BackupRow> for Backup {
    type Error = InfraError;

    fn try_from(row: BackupRow) -> Result<Self, Self::Error> {
        let corrupted = |e: stocker_domain::DomainError| InfraError::corrupted(e.to_string());

        Ok(Backup::from_db(BackupRecord {
            id:               BackupId::from_uuid(row.id),
            tenant_id:        TenantId::from_uuid(row.tenant_id),
            name:             BackupName::new(row.backup_name).map_err(corrupted)?,
            backup_type:      row.backup_type.parse::<BackupType>().map_err(corrupted)?,
            status:           row.status.parse::<BackupStatus>().map_err(corrupted)?,
            // DB 上は「何も含まない」行も許容されるため検証を通さない
            scope:            BackupScope {
                includes_database:      row.includes_database,
                includes_files:         row.includes_files,
                includes_configuration: row.includes_configuration,
            },
            description:      row.description,
            created_by:       ActorName::new(row.created_by).map_err(corrupted)?,
            created_at:       row.created_at,
            completed_at:     row.completed_at,
            size_in_bytes:    row.size_in_bytes.map(|size| size.max(0) as u64),
            is_restorable:    row.is_restorable,
            last_restored_at: row.last_restored_at,
            restore_count:    row.restore_count.max(0) as u32,
            restore_notes:    row.restore_notes,
            error_message:    row.error_message,
            version:          row.version.max(1) as u32,
        }))
    }
}

/// 検索条件を WHERE 句に追加する
fn push_filter<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    tenant_id: &'a TenantId,
    filter: &'a BackupFilter,
) {
    builder.push(" WHERE tenant_id = ").push_bind(tenant_id.as_uuid());

    if let Some(status) = filter.status {
        let status: &'static str = status.into();
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(backup_type) = filter.backup_type {
        let backup_type: &'static str = backup_type.into();
        builder.push(" AND backup_type = ").push_bind(backup_type);
    }
    if let Some(search) = filter.search.as_deref() {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (backup_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// PostgreSQL 実装の BackupRepository
#[derive(Debug, Clone)]
pub struct PostgresBackupRepository {
    pool: PgPool,
}

impl PostgresBackupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackupRepository for PostgresBackupRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id, %tenant_id))]
    async fn find_by_id(
        &self,
        id: &BackupId,
        tenant_id: &TenantId,
    ) -> Result<Option<Backup>, InfraError> {
        let mut conn = TenantConnection::acquire(&self.pool, tenant_id).await?;

        let row = sqlx::query_as::<_, BackupRow>(&format!(
            "SELECT {BACKUP_COLUMNS} FROM tenant_backups WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Backup::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id, page = page.page_number()))]
    async fn find_page(
        &self,
        tenant_id: &TenantId,
        filter: &BackupFilter,
        page: PageRequest,
    ) -> Result<PagedResult<Backup>, InfraError> {
        let mut conn = TenantConnection::acquire(&self.pool, tenant_id).await?;

        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tenant_backups");
        push_filter(&mut count_query, tenant_id, filter);
        let (total,): (i64,) = count_query.build_query_as().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {BACKUP_COLUMNS} FROM tenant_backups"
        ));
        push_filter(&mut select, tenant_id, filter);
        select.push(if filter.sort_descending {
            " ORDER BY created_at DESC, id DESC"
        } else {
            " ORDER BY created_at ASC, id ASC"
        });
        select
            .push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows: Vec<BackupRow> = select.build_query_as().fetch_all(&mut *conn).await?;
        let backups = rows
            .into_iter()
            .map(Backup::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        PagedResult::new(backups, page, total.max(0) as u64)
            .map_err(|e| InfraError::unexpected(e.to_string()))
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id))]
    async fn statistics(&self, tenant_id: &TenantId) -> Result<BackupStatistics, InfraError> {
        let mut conn = TenantConnection::acquire(&self.pool, tenant_id).await?;

        let row = sqlx::query_as::<_, StatisticsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status IN ('pending', 'in_progress')) AS pending,
                COALESCE(SUM(size_in_bytes) FILTER (WHERE status = 'completed'), 0)::BIGINT AS size,
                MAX(completed_at) FILTER (WHERE status = 'completed') AS last_completed_at,
                COALESCE(SUM(restore_count), 0)::BIGINT AS restores
            FROM tenant_backups
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;

        Ok(BackupStatistics {
            total_backups:      row.total.max(0) as u64,
            completed_backups:  row.completed.max(0) as u64,
            failed_backups:     row.failed.max(0) as u64,
            pending_backups:    row.pending.max(0) as u64,
            total_size_bytes:   row.size.max(0) as u64,
            last_completed_at:  row.last_completed_at,
            total_restore_runs: row.restores.max(0) as u64,
        })
    }

    #[tracing::instrument(skip_all, level = "debug", fields(backup_id = %backup.id(), tenant_id = %backup.tenant_id()))]
    async fn insert(&self, tx: &mut TxContext, backup: &Backup) -> Result<(), InfraError> {
        let backup_type: &'static str = backup.backup_type().into();
        let status: &'static str = backup.status().into();
        let scope = backup.scope();

        sqlx::query(
            r#"
            INSERT INTO tenant_backups (
                id, tenant_id, backup_name, backup_type, status,
                includes_database, includes_files, includes_configuration,
                description, created_by, created_at, completed_at, size_in_bytes,
                is_restorable, last_restored_at, restore_count, restore_notes,
                error_message, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(backup.id().as_uuid())
        .bind(backup.tenant_id().as_uuid())
        .bind(backup.name().as_str())
        .bind(backup_type)
        .bind(status)
        .bind(scope.includes_database)
        .bind(scope.includes_files)
        .bind(scope.includes_configuration)
        .bind(backup.description())
        .bind(backup.created_by().as_str())
        .bind(backup.created_at())
        .bind(backup.completed_at())
        .bind(backup.size_in_bytes().map(|size| size as i64))
        .bind(backup.is_restorable())
        .bind(backup.last_restored_at())
        .bind(backup.restore_count() as i32)
        .bind(backup.restore_notes())
        .bind(backup.error_message())
        .bind(backup.version() as i32)
        .execute(tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(backup_id = %backup.id(), expected_version = expected_version))]
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        backup: &Backup,
        expected_version: u32,
    ) -> Result<(), InfraError> {
        let status: &'static str = backup.status().into();

        let result = sqlx::query(
            r#"
            UPDATE tenant_backups
            SET status = $4,
                completed_at = $5,
                size_in_bytes = $6,
                is_restorable = $7,
                last_restored_at = $8,
                restore_count = $9,
                restore_notes = $10,
                error_message = $11,
                version = $12
            WHERE id = $1 AND tenant_id = $2 AND version = $3
            "#,
        )
        .bind(backup.id().as_uuid())
        .bind(backup.tenant_id().as_uuid())
        .bind(expected_version as i32)
        .bind(status)
        .bind(backup.completed_at())
        .bind(backup.size_in_bytes().map(|size| size as i64))
        .bind(backup.is_restorable())
        .bind(backup.last_restored_at())
        .bind(backup.restore_count() as i32)
        .bind(backup.restore_notes())
        .bind(backup.error_message())
        .bind(backup.version() as i32)
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict("Backup", backup.id().to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %tenant_id))]
    async fn delete(
        &self,
        tx: &mut TxContext,
        id: &BackupId,
        tenant_id: &TenantId,
    ) -> Result<(), InfraError> {
        let result = sqlx::query("DELETE FROM tenant_backups WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict("Backup", id.to_string()));
        }
        Ok(())
    }
}
