//! # Stocker ドメイン層
//!
//! ディスパッチャ上で動くハンドラが扱うドメインモデルと、
//! 失敗を表現する [`DomainError`] を定義する。
//!
//! ## 設計方針
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: Backup, Tenant）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: TenantId,
//!   PasswordPolicy）
//! - **ドメインエラー**: 想定内の失敗をコード・メッセージ・カテゴリで表現する
//!
//! ## 依存関係の方向
//!
//! ```text
//! core-service → infra → domain → shared
//! ```
//!
//! ドメイン層は `shared` のみに依存し、インフラ層（DB）には一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`error`] - ドメインエラーとエラーカテゴリ
//! - [`tenant`] - テナント識別子とテナントエンティティ
//! - [`backup`] - テナント単位のバックアップ
//! - [`backup_quota`] - 月間バックアップ枠
//! - [`security_settings`] - パスワード・セッションポリシー
//! - [`clock`] - 時刻プロバイダ
//!
//! ## 使用例
//!
//! ```rust
//! use stocker_domain::{DomainError, ErrorCategory, tenant::TenantId};
//!
//! let tenant_id = TenantId::new();
//!
//! let error = DomainError::not_found("Backup.NotFound", "バックアップが見つかりません");
//! assert_eq!(error.category(), ErrorCategory::NotFound);
//! ```

#[macro_use]
mod macros;

pub mod backup;
pub mod backup_quota;
pub mod clock;
pub mod error;
pub mod security_settings;
pub mod tenant;

pub use error::{DomainError, DomainResult, ErrorCategory};
