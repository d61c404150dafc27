//! # ハンドラ
//!
//! リクエスト型 1 つにつきハンドラ 1 つを実装する。
//!
//! ハンドラは型付きのリクエストと [`HandlerContext`] を受け取り、
//! テナントで絞り込まれたストレージに対して処理を行い、`Result` を返す。
//! クエリハンドラは状態を変更しない。

use async_trait::async_trait;
use stocker_domain::tenant::TenantId;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    request::{Request, ScopeContext},
    tenant_context::{PlatformContext, TenantContext},
};
use crate::error::CoreError;

/// ハンドラに渡されるコンテキスト
///
/// 解決済みのスコープ（テナントスコープなら [`TenantContext`]）と
/// キャンセルトークンを運ぶ。
#[derive(Debug, Clone)]
pub struct HandlerContext<C> {
    scope:       C,
    cancel:      CancellationToken,
    dispatch_id: Uuid,
}

impl<C> HandlerContext<C> {
    pub fn new(scope: C, cancel: CancellationToken, dispatch_id: Uuid) -> Self {
        Self {
            scope,
            cancel,
            dispatch_id,
        }
    }

    pub fn scope(&self) -> &C {
        &self.scope
    }

    pub fn dispatch_id(&self) -> Uuid {
        self.dispatch_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// キャンセル済みなら `CoreError::Cancelled` を返す
    ///
    /// ハンドラは I/O の前後で呼び出す。
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }
}

impl HandlerContext<TenantContext> {
    /// テナントスコープのコンテキストを作成する
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self::new(
            TenantContext::new(tenant_id),
            CancellationToken::new(),
            Uuid::now_v7(),
        )
    }

    /// 検証済みのテナント ID
    pub fn tenant_id(&self) -> &TenantId {
        self.scope.tenant_id()
    }
}

impl HandlerContext<PlatformContext> {
    /// プラットフォームスコープのコンテキストを作成する
    pub fn for_platform() -> Self {
        Self::new(PlatformContext, CancellationToken::new(), Uuid::now_v7())
    }
}

/// リクエストハンドラ
#[async_trait]
pub trait Handler<R: Request>: Send + Sync + 'static {
    async fn handle(
        &self,
        request: R,
        ctx: &HandlerContext<ScopeContext<R>>,
    ) -> Result<R::Output, CoreError>;
}
