//! # テナント管理ユースケース
//!
//! プラットフォーム管理者向けの操作。テナントクレームを持たない
//! プラットフォームスコープのリクエストとしてディスパッチされる。

use std::sync::Arc;

use async_trait::async_trait;
use stocker_domain::{
    DomainError,
    tenant::{TENANT_NOT_FOUND, Tenant, TenantId, TenantStatus},
};
use stocker_infra::{db::TransactionManager, repository::TenantRepository};
use stocker_shared::{
    PageRequest,
    PagedResult,
    event_log::event::{action, category, entity_type, result},
    log_business_event,
};

use crate::{
    dispatch::{Handler, HandlerContext, PlatformContext, PlatformScoped, Request, RequestKind},
    error::CoreError,
};

/// テナントを取得する
#[derive(Debug, Clone)]
pub struct GetTenantQuery {
    pub tenant_id: TenantId,
}

impl Request for GetTenantQuery {
    type Output = Tenant;
    type Scope = PlatformScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "GetTenantQuery";
}

/// テナント一覧をページングして取得する
#[derive(Debug, Clone, Copy)]
pub struct ListTenantsQuery {
    pub page_number: u32,
    pub page_size:   u32,
}

impl Request for ListTenantsQuery {
    type Output = PagedResult<Tenant>;
    type Scope = PlatformScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "ListTenantsQuery";
}

/// テナントの利用状態を変更する
#[derive(Debug, Clone)]
pub struct ChangeTenantStatusCommand {
    pub tenant_id: TenantId,
    pub status:    TenantStatus,
}

impl Request for ChangeTenantStatusCommand {
    type Output = Tenant;
    type Scope = PlatformScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "ChangeTenantStatusCommand";
}

/// テナント管理ユースケース
pub struct TenantUseCaseImpl {
    tenants:    Arc<dyn TenantRepository>,
    tx_manager: Arc<dyn TransactionManager>,
}

impl TenantUseCaseImpl {
    pub fn new(tenants: Arc<dyn TenantRepository>, tx_manager: Arc<dyn TransactionManager>) -> Self {
        Self {
            tenants,
            tx_manager,
        }
    }

    async fn load(&self, tenant_id: &TenantId) -> Result<Tenant, CoreError> {
        self.tenants.find_by_id(tenant_id).await?.ok_or_else(|| {
            DomainError::not_found(
                TENANT_NOT_FOUND,
                format!("テナントが見つかりません: {tenant_id}"),
            )
            .into()
        })
    }
}

#[async_trait]
impl Handler<GetTenantQuery> for TenantUseCaseImpl {
    async fn handle(
        &self,
        request: GetTenantQuery,
        ctx: &HandlerContext<PlatformContext>,
    ) -> Result<Tenant, CoreError> {
        ctx.ensure_active()?;
        self.load(&request.tenant_id).await
    }
}

#[async_trait]
impl Handler<ListTenantsQuery> for TenantUseCaseImpl {
    async fn handle(
        &self,
        request: ListTenantsQuery,
        ctx: &HandlerContext<PlatformContext>,
    ) -> Result<PagedResult<Tenant>, CoreError> {
        let page =
            PageRequest::new(request.page_number, request.page_size).map_err(DomainError::from)?;

        ctx.ensure_active()?;
        Ok(self.tenants.find_page(page).await?)
    }
}

#[async_trait]
impl Handler<ChangeTenantStatusCommand> for TenantUseCaseImpl {
    async fn handle(
        &self,
        request: ChangeTenantStatusCommand,
        ctx: &HandlerContext<PlatformContext>,
    ) -> Result<Tenant, CoreError> {
        ctx.ensure_active()?;
        let tenant = self.load(&request.tenant_id).await?;
        let previous: &'static str = tenant.status().into();
        let updated = tenant.with_status(request.status)?;

        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(updated.id()).await?;
        self.tenants.update_status(&mut tx, &updated).await?;
        tx.commit().await?;

        log_business_event!(
            event.category = category::TENANT,
            event.action = action::TENANT_STATUS_CHANGED,
            event.entity_type = entity_type::TENANT,
            event.entity_id = %updated.id(),
            event.tenant_id = %updated.id(),
            event.result = result::SUCCESS,
            tenant.previous_status = previous,
            tenant.status = %updated.status(),
            "テナントの利用状態を変更しました"
        );

        Ok(updated)
    }
}
