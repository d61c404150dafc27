//! # リポジトリ実装
//!
//! ハンドラが利用するリポジトリトレイトと PostgreSQL 実装を提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: ハンドラはトレイトにのみ依存し、`Arc<dyn ...>` で注入される
//! - **書き込みは TxContext 必須**: 複数の書き込みを 1 トランザクションにまとめられる
//! - **テスタビリティ**: `test-utils` feature のモック実装と差し替え可能

pub mod backup_quota_repository;
pub mod backup_repository;
pub mod security_settings_repository;
pub mod tenant_repository;

pub use backup_quota_repository::{BackupQuotaRepository, PostgresBackupQuotaRepository};
pub use backup_repository::{BackupRepository, PostgresBackupRepository};
pub use security_settings_repository::{
    PostgresSecuritySettingsRepository,
    SecuritySettingsRepository,
};
pub use tenant_repository::{PostgresTenantRepository, TenantRepository};
