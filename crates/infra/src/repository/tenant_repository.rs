//! # TenantRepository
//!
//! テナント情報の取得と状態変更を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - テナントテーブル自体はテナント横断（プラットフォーム管理）のため RLS を持たない
//! - 一覧はページング付きで返す

use async_trait::async_trait;
use sqlx::PgPool;
use stocker_domain::tenant::{Tenant, TenantId, TenantName, TenantStatus};
use stocker_shared::{PageRequest, PagedResult};
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// テナントリポジトリトレイト
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// ID でテナントを検索
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, InfraError>;

    /// テナント一覧を作成順で取得
    async fn find_page(&self, page: PageRequest) -> Result<PagedResult<Tenant>, InfraError>;

    /// テナントの状態を更新
    async fn update_status(&self, tx: &mut TxContext, tenant: &Tenant) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    id:     Uuid,
    name:   String,
    status: String,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = InfraError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant::from_db(
            TenantId::from_uuid(row.id),
            TenantName::new(row.name).map_err(|e| InfraError::corrupted(e.to_string()))?,
            row.status
                .parse::<TenantStatus>()
                .map_err(|e| InfraError::corrupted(e.to_string()))?,
        ))
    }
}

/// PostgreSQL 実装の TenantRepository
#[derive(Debug, Clone)]
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, InfraError> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, name, status
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tenant::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(page = page.page_number()))]
    async fn find_page(&self, page: PageRequest) -> Result<PagedResult<Tenant>, InfraError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT id, name, status
            FROM tenants
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let tenants = rows
            .into_iter()
            .map(Tenant::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        PagedResult::new(tenants, page, total.max(0) as u64)
            .map_err(|e| InfraError::unexpected(e.to_string()))
    }

    #[tracing::instrument(skip_all, level = "debug", fields(tenant_id = %tenant.id()))]
    async fn update_status(&self, tx: &mut TxContext, tenant: &Tenant) -> Result<(), InfraError> {
        let status: &'static str = tenant.status().into();
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET status = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(tenant.id().as_uuid())
        .bind(status)
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict("Tenant", tenant.id().to_string()));
        }
        Ok(())
    }
}
