//! # ユースケース層
//!
//! ディスパッチャから呼ばれるハンドラを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリを `Arc<dyn Trait>` で外部から注入
//! - **リクエスト型ごとのハンドラ**: 1 つのユースケース構造体が
//!   複数のリクエスト型に対して `Handler` を実装する
//! - **書き込みは 1 トランザクション**: コマンドの書き込みは `TxContext` に載せてまとめてコミットする
//!
//! ## モジュール構成
//!
//! - `backup`: バックアップ（テナントスコープ）
//! - `security_settings`: セキュリティ設定（テナントスコープ）
//! - `tenant`: テナント管理（プラットフォームスコープ）

pub mod backup;
pub mod security_settings;
pub mod tenant;

pub use backup::{
    BackupUseCaseImpl,
    CreateBackupCommand,
    DeleteBackupCommand,
    GetBackupByIdQuery,
    GetBackupStatisticsQuery,
    GetBackupsQuery,
    RecordBackupResultCommand,
    RestoreBackupCommand,
};
pub use security_settings::{
    GetSecuritySettingsQuery,
    SecuritySettingsUseCaseImpl,
    UpdatePasswordPolicyCommand,
    UpdateSessionPolicyCommand,
};
pub use tenant::{ChangeTenantStatusCommand, GetTenantQuery, ListTenantsQuery, TenantUseCaseImpl};
