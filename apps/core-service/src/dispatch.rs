//! # テナントスコープ付きコマンド / クエリディスパッチ
//!
//! 業務モジュールが共通で使うディスパッチパイプライン。
//! 呼び出し元は型付きのリクエストをエンベロープに包んでディスパッチャに投入し、
//! 型付きの `Result` を受け取る。
//!
//! ## モジュール構成
//!
//! - [`request`] - リクエスト、スコープ、エンベロープ
//! - [`tenant_context`] - テナントクレームの検証
//! - [`handler`] - ハンドラ trait とハンドラコンテキスト
//! - [`registry`] - リクエスト型 → ハンドラの対応
//! - [`behavior`] - ハンドラ前後の横断処理
//! - [`dispatcher`] - パイプライン本体
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let backup = dispatcher
//!     .dispatch(
//!         Envelope::tenant(claim, GetBackupByIdQuery { backup_id }),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! ```

pub mod behavior;
pub(crate) mod canonical_log;
pub mod dispatcher;
pub mod handler;
pub mod registry;
pub mod request;
pub mod tenant_context;

pub use behavior::{ActiveTenantBehavior, DispatchMeta, PipelineBehavior};
pub use dispatcher::Dispatcher;
pub use handler::{Handler, HandlerContext};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};
pub use request::{
    Envelope,
    PlatformScoped,
    Request,
    RequestKind,
    RequestScope,
    ScopeContext,
    TenantScoped,
};
pub use tenant_context::{PlatformContext, TenantContext};
