//! # バックアップユースケース
//!
//! テナント単位のバックアップの参照・作成・結果記録・削除・復元を扱う。
//!
//! リクエスト型はすべてテナントスコープ。ハンドラは [`BackupUseCaseImpl`] が
//! リクエスト型ごとに `Handler` を実装する。
//!
//! - `query`: 参照系（状態を変更しない）
//! - `command`: 更新系（書き込みは 1 トランザクション）

mod command;
mod query;

use std::sync::Arc;

use stocker_domain::{
    DomainError,
    backup::{
        BACKUP_NOT_FOUND,
        Backup,
        BackupId,
        BackupOutcome,
        BackupStatistics,
        BackupStatus,
        BackupType,
    },
    clock::Clock,
    tenant::TenantId,
};
use stocker_infra::{
    db::TransactionManager,
    repository::{BackupQuotaRepository, BackupRepository},
};
use stocker_shared::PagedResult;

use crate::{
    dispatch::{Request, RequestKind, TenantScoped},
    error::CoreError,
};

// =============================================================================
// リクエスト
// =============================================================================

/// ID でバックアップを取得する
#[derive(Debug, Clone)]
pub struct GetBackupByIdQuery {
    pub backup_id: BackupId,
}

impl Request for GetBackupByIdQuery {
    type Output = Backup;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "GetBackupByIdQuery";
}

/// バックアップ一覧をページングして取得する
#[derive(Debug, Clone)]
pub struct GetBackupsQuery {
    /// 1 始まりのページ番号
    pub page_number:     u32,
    pub page_size:       u32,
    pub status:          Option<BackupStatus>,
    pub backup_type:     Option<BackupType>,
    /// 名前・説明の部分一致
    pub search:          Option<String>,
    pub sort_descending: bool,
}

impl Request for GetBackupsQuery {
    type Output = PagedResult<Backup>;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "GetBackupsQuery";
}

/// テナントのバックアップ統計を取得する
#[derive(Debug, Clone, Copy)]
pub struct GetBackupStatisticsQuery;

impl Request for GetBackupStatisticsQuery {
    type Output = BackupStatistics;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "GetBackupStatisticsQuery";
}

/// バックアップを要求する
///
/// 月間バックアップ枠を 1 つ消費する。
#[derive(Debug, Clone)]
pub struct CreateBackupCommand {
    pub backup_name:            String,
    pub backup_type:            BackupType,
    pub includes_database:      bool,
    pub includes_files:         bool,
    pub includes_configuration: bool,
    pub description:            Option<String>,
    pub created_by:             String,
}

impl Request for CreateBackupCommand {
    type Output = BackupId;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "CreateBackupCommand";
}

/// バックアップの実行結果を記録する
#[derive(Debug, Clone)]
pub struct RecordBackupResultCommand {
    pub backup_id: BackupId,
    pub outcome:   BackupOutcome,
}

impl Request for RecordBackupResultCommand {
    type Output = Backup;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "RecordBackupResultCommand";
}

/// バックアップを削除する
#[derive(Debug, Clone)]
pub struct DeleteBackupCommand {
    pub backup_id: BackupId,
}

impl Request for DeleteBackupCommand {
    type Output = ();
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "DeleteBackupCommand";
}

/// バックアップから復元する
#[derive(Debug, Clone)]
pub struct RestoreBackupCommand {
    pub backup_id: BackupId,
    pub notes:     Option<String>,
}

impl Request for RestoreBackupCommand {
    type Output = Backup;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "RestoreBackupCommand";
}

// =============================================================================
// ユースケース
// =============================================================================

/// バックアップユースケース
pub struct BackupUseCaseImpl {
    backups:    Arc<dyn BackupRepository>,
    quotas:     Arc<dyn BackupQuotaRepository>,
    tx_manager: Arc<dyn TransactionManager>,
    clock:      Arc<dyn Clock>,
}

impl BackupUseCaseImpl {
    pub fn new(
        backups: Arc<dyn BackupRepository>,
        quotas: Arc<dyn BackupQuotaRepository>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backups,
            quotas,
            tx_manager,
            clock,
        }
    }

    /// テナント内のバックアップを取得し、存在しなければ `Backup.NotFound` を返す
    async fn load(&self, backup_id: &BackupId, tenant_id: &TenantId) -> Result<Backup, CoreError> {
        self.backups
            .find_by_id(backup_id, tenant_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(
                    BACKUP_NOT_FOUND,
                    format!("バックアップが見つかりません: {backup_id}"),
                )
                .into()
            })
    }
}
