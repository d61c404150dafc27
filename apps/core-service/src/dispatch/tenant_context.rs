//! # テナントコンテキスト
//!
//! エンベロープのテナントクレームを検証し、ハンドラに渡すコンテキストへ解決する。
//! 検証は毎回のディスパッチで行い、結果はキャッシュしない。

use stocker_domain::{DomainResult, tenant::TenantId};

/// 検証済みのテナントコンテキスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    /// 生のテナントクレームを検証する
    ///
    /// - 空・空白のみ・nil UUID は `Tenant.Missing`（Validation）
    /// - UUID として解釈できない値は `Tenant.Invalid`（Validation）
    pub fn resolve(claim: &str) -> DomainResult<Self> {
        TenantId::parse(claim).map(Self::new)
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// プラットフォームスコープのコンテキスト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformContext;
