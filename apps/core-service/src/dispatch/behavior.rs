//! # パイプラインビヘイビア
//!
//! ハンドラの前後に挟む横断的な処理。
//!
//! `before_handle` が `Err` を返すとハンドラは呼ばれず、そのエラーが結果になる。
//! `after_handle` は結果を観測するだけで、変更はできない。
//! ビヘイビアは登録順に実行される。

use std::sync::Arc;

use async_trait::async_trait;
use stocker_domain::{
    DomainError,
    tenant::{TENANT_NOT_FOUND, TenantId},
};
use stocker_infra::repository::TenantRepository;
use uuid::Uuid;

use super::request::RequestKind;
use crate::error::CoreError;

/// 1 回のディスパッチのメタデータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMeta {
    pub dispatch_id:  Uuid,
    pub request_name: &'static str,
    pub kind:         RequestKind,
    /// テナントスコープのリクエストでのみ `Some`
    pub tenant_id:    Option<TenantId>,
}

/// パイプラインビヘイビア
#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    /// ログ出力用の名前
    fn name(&self) -> &'static str;

    /// ハンドラ実行前に呼ばれる
    async fn before_handle(&self, _meta: &DispatchMeta) -> Result<(), CoreError> {
        Ok(())
    }

    /// ハンドラ実行後に呼ばれる（`error` は失敗時のみ `Some`）
    async fn after_handle(&self, _meta: &DispatchMeta, _error: Option<&DomainError>) {}
}

/// テナントが存在し、利用中であることを確認するビヘイビア
///
/// - 存在しない → `NotFound`（`Tenant.NotFound`）
/// - 利用停止中 → `Forbidden`（`Tenant.Suspended`）
///
/// プラットフォームスコープのリクエストは素通しする。
pub struct ActiveTenantBehavior {
    tenants: Arc<dyn TenantRepository>,
}

impl ActiveTenantBehavior {
    pub fn new(tenants: Arc<dyn TenantRepository>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl PipelineBehavior for ActiveTenantBehavior {
    fn name(&self) -> &'static str {
        "active_tenant"
    }

    async fn before_handle(&self, meta: &DispatchMeta) -> Result<(), CoreError> {
        let Some(tenant_id) = &meta.tenant_id else {
            return Ok(());
        };

        let tenant = self.tenants.find_by_id(tenant_id).await?.ok_or_else(|| {
            DomainError::not_found(
                TENANT_NOT_FOUND,
                format!("テナントが見つかりません: {tenant_id}"),
            )
        })?;
        tenant.ensure_active()?;
        Ok(())
    }
}
