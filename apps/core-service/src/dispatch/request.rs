//! # リクエストとエンベロープ
//!
//! ディスパッチャに投入する 1 単位の処理（コマンド / クエリ）の型を定義する。
//!
//! ## 設計方針
//!
//! - **スコープは型で決まる**: テナントスコープかプラットフォームスコープかは
//!   `Request::Scope` で宣言し、実行時のマーカー判定は行わない
//! - **エンベロープのコンストラクタはスコープごとに別**: テナントスコープの
//!   リクエストは [`Envelope::tenant`]、プラットフォームスコープは
//!   [`Envelope::platform`] でしか作れない
//! - **エンベロープは不変**: 作成後にテナントクレームや本体を差し替えられない

use stocker_domain::{DomainResult, tenant::TenantId};

use super::tenant_context::{PlatformContext, TenantContext};

/// リクエストの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// 状態を変更する
    Command,
    /// 状態を変更しない
    Query,
}

/// ディスパッチ可能なリクエスト
///
/// `NAME` はログとスタートアップ検証に使う安定した名前。
/// リクエスト型ごとに一意でなければならない。
pub trait Request: Send + 'static {
    /// 成功時の値
    type Output: Send + 'static;
    /// テナントスコープかプラットフォームスコープか
    type Scope: RequestScope;

    const NAME: &'static str;
    const KIND: RequestKind;
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::TenantScoped {}
    impl Sealed for super::PlatformScoped {}
}

/// リクエストのスコープ
///
/// エンベロープが運ぶクレームを、ハンドラに渡すコンテキストへ解決する。
/// 実装は [`TenantScoped`] と [`PlatformScoped`] の 2 つに限る。
pub trait RequestScope: sealed::Sealed + Send + Sync + 'static {
    /// エンベロープが運ぶクレーム
    type Claim: Send + 'static;
    /// 解決済みのコンテキスト
    type Context: Send + Sync + Clone + 'static;

    /// クレームを検証してコンテキストに解決する
    fn resolve(claim: Self::Claim) -> DomainResult<Self::Context>;

    /// コンテキストが持つテナント ID（プラットフォームスコープは `None`）
    fn tenant_id(context: &Self::Context) -> Option<&TenantId>;
}

/// テナントスコープ
///
/// クレームは認証コンテキストから取り出した生のテナント ID 文字列。
#[derive(Debug)]
pub enum TenantScoped {}

impl RequestScope for TenantScoped {
    type Claim = String;
    type Context = TenantContext;

    fn resolve(claim: Self::Claim) -> DomainResult<Self::Context> {
        TenantContext::resolve(&claim)
    }

    fn tenant_id(context: &Self::Context) -> Option<&TenantId> {
        Some(context.tenant_id())
    }
}

/// プラットフォームスコープ（テナントクレームを持たない）
#[derive(Debug)]
pub enum PlatformScoped {}

impl RequestScope for PlatformScoped {
    type Claim = ();
    type Context = PlatformContext;

    fn resolve(_claim: Self::Claim) -> DomainResult<Self::Context> {
        Ok(PlatformContext)
    }

    fn tenant_id(_context: &Self::Context) -> Option<&TenantId> {
        None
    }
}

/// リクエストのスコープクレーム型
pub type ScopeClaim<R> = <<R as Request>::Scope as RequestScope>::Claim;

/// リクエストのスコープコンテキスト型
pub type ScopeContext<R> = <<R as Request>::Scope as RequestScope>::Context;

/// リクエストエンベロープ
///
/// 1 回のディスパッチで消費される不変の値。
pub struct Envelope<R: Request> {
    claim:   ScopeClaim<R>,
    request: R,
}

impl<R: Request<Scope = TenantScoped>> Envelope<R> {
    /// テナントスコープのエンベロープを作成する
    ///
    /// `tenant_id` は認証コンテキストの値をそのまま渡す。
    /// 検証はディスパッチ時に行われる。
    pub fn tenant(tenant_id: impl Into<String>, request: R) -> Self {
        Self {
            claim: tenant_id.into(),
            request,
        }
    }

    /// 検証済みの `TenantId` からエンベロープを作成する
    pub fn for_tenant(tenant_id: &TenantId, request: R) -> Self {
        Self::tenant(tenant_id.to_string(), request)
    }

    /// エンベロープが運ぶテナントクレーム
    pub fn tenant_claim(&self) -> &str {
        &self.claim
    }
}

impl<R: Request<Scope = PlatformScoped>> Envelope<R> {
    /// プラットフォームスコープのエンベロープを作成する
    pub fn platform(request: R) -> Self {
        Self { claim: (), request }
    }
}

impl<R: Request> Envelope<R> {
    pub fn request(&self) -> &R {
        &self.request
    }

    pub(crate) fn into_parts(self) -> (ScopeClaim<R>, R) {
        (self.claim, self.request)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use stocker_domain::{ErrorCategory, tenant::TENANT_MISSING};

    use super::*;

    struct Ping;

    impl Request for Ping {
        type Output = ();
        type Scope = TenantScoped;

        const KIND: RequestKind = RequestKind::Query;
        const NAME: &'static str = "Ping";
    }

    struct PlatformPing;

    impl Request for PlatformPing {
        type Output = ();
        type Scope = PlatformScoped;

        const KIND: RequestKind = RequestKind::Query;
        const NAME: &'static str = "PlatformPing";
    }

    #[test]
    fn test_テナントエンベロープはクレームをそのまま保持する() {
        let sut = Envelope::tenant("  raw-claim ", Ping);

        assert_eq!(sut.tenant_claim(), "  raw-claim ");
    }

    #[test]
    fn test_for_tenantは検証済みidの文字列表現を保持する() {
        let tenant_id = TenantId::new();

        let sut = Envelope::for_tenant(&tenant_id, Ping);

        assert_eq!(sut.tenant_claim(), tenant_id.to_string());
    }

    #[test]
    fn test_テナントスコープは空のクレームを拒否する() {
        let error = TenantScoped::resolve(String::new()).unwrap_err();

        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.code(), TENANT_MISSING);
    }

    #[test]
    fn test_プラットフォームスコープはテナントidを持たない() {
        let (claim, _) = Envelope::platform(PlatformPing).into_parts();
        let context = PlatformScoped::resolve(claim).unwrap();

        assert!(PlatformScoped::tenant_id(&context).is_none());
    }

    #[test]
    fn test_リクエスト種別はスネークケースで表示される() {
        assert_eq!(RequestKind::Command.to_string(), "command");
        assert_eq!(<&'static str>::from(RequestKind::Query), "query");
    }
}
