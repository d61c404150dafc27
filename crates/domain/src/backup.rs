//! # バックアップ
//!
//! テナント単位のバックアップ（データベース・ファイル・設定のスナップショット）を扱う。
//!
//! ## 状態遷移
//!
//! ```text
//! Pending ──┬──→ Completed ──(restore)──→ Completed（restore_count + 1）
//! InProgress┘└─→ Failed
//! ```
//!
//! - 完了済み（Completed / Failed）のバックアップに結果を再記録することはできない
//! - 実行中（InProgress）のバックアップは削除できない
//! - 復元できるのは Completed かつ `is_restorable` のバックアップのみ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, DomainResult, tenant::TenantId};

/// バックアップが存在しない
pub const BACKUP_NOT_FOUND: &str = "Backup.NotFound";

define_uuid_id! {
    /// バックアップ ID
    pub struct BackupId;
}

define_validated_string! {
    /// バックアップ名（DB: `VARCHAR(200)`）
    pub struct BackupName {
        label: "バックアップ名",
        max_length: 200,
    }
}

define_validated_string! {
    /// 操作者名（DB: `VARCHAR(100)`）
    pub struct ActorName {
        label: "操作者名",
        max_length: 100,
        pii: true,
    }
}

/// バックアップ種別
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackupType {
    /// 全体
    Full,
    /// 前回バックアップからの増分
    Incremental,
    /// 前回の全体バックアップからの差分
    Differential,
}

impl std::str::FromStr for BackupType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            "differential" => Ok(Self::Differential),
            _ => Err(DomainError::validation(
                "BackupType.Invalid",
                format!("不正なバックアップ種別: {s}"),
            )),
        }
    }
}

/// バックアップ状態
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackupStatus {
    /// 受付済み
    Pending,
    /// 実行中
    InProgress,
    /// 完了
    Completed,
    /// 失敗
    Failed,
}

impl BackupStatus {
    /// 結果が確定しているか
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for BackupStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::validation(
                "BackupStatus.Invalid",
                format!("不正なバックアップ状態: {s}"),
            )),
        }
    }
}

/// バックアップ対象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackupScope {
    pub includes_database:      bool,
    pub includes_files:         bool,
    pub includes_configuration: bool,
}

impl BackupScope {
    /// 少なくとも 1 つの対象が選ばれているか検証する
    pub fn new(
        includes_database: bool,
        includes_files: bool,
        includes_configuration: bool,
    ) -> DomainResult<Self> {
        if !(includes_database || includes_files || includes_configuration) {
            return Err(DomainError::validation(
                "Backup.NothingSelected",
                "バックアップ対象を 1 つ以上選択してください",
            ));
        }
        Ok(Self {
            includes_database,
            includes_files,
            includes_configuration,
        })
    }
}

/// バックアップ実行結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackupOutcome {
    Completed { size_in_bytes: u64 },
    Failed { error_message: String },
}

/// バックアップ作成パラメータ
pub struct NewBackup {
    pub id:          BackupId,
    pub tenant_id:   TenantId,
    pub name:        BackupName,
    pub backup_type: BackupType,
    pub scope:       BackupScope,
    pub description: Option<String>,
    pub created_by:  ActorName,
    pub now:         DateTime<Utc>,
}

/// DB から復元するためのレコード
pub struct BackupRecord {
    pub id:               BackupId,
    pub tenant_id:        TenantId,
    pub name:             BackupName,
    pub backup_type:      BackupType,
    pub status:           BackupStatus,
    pub scope:            BackupScope,
    pub description:      Option<String>,
    pub created_by:       ActorName,
    pub created_at:       DateTime<Utc>,
    pub completed_at:     Option<DateTime<Utc>>,
    pub size_in_bytes:    Option<u64>,
    pub is_restorable:    bool,
    pub last_restored_at: Option<DateTime<Utc>>,
    pub restore_count:    u32,
    pub restore_notes:    Option<String>,
    pub error_message:    Option<String>,
    pub version:          u32,
}

/// バックアップエンティティ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    id:               BackupId,
    tenant_id:        TenantId,
    name:             BackupName,
    backup_type:      BackupType,
    status:           BackupStatus,
    scope:            BackupScope,
    description:      Option<String>,
    created_by:       ActorName,
    created_at:       DateTime<Utc>,
    completed_at:     Option<DateTime<Utc>>,
    size_in_bytes:    Option<u64>,
    is_restorable:    bool,
    last_restored_at: Option<DateTime<Utc>>,
    restore_count:    u32,
    restore_notes:    Option<String>,
    error_message:    Option<String>,
    /// 楽観的ロック用のバージョン（1 始まり、更新ごとに +1）
    version:          u32,
}

impl Backup {
    /// 新しいバックアップ要求を作成する（Pending）
    pub fn new(params: NewBackup) -> Self {
        Self {
            id:               params.id,
            tenant_id:        params.tenant_id,
            name:             params.name,
            backup_type:      params.backup_type,
            status:           BackupStatus::Pending,
            scope:            params.scope,
            description:      params.description,
            created_by:       params.created_by,
            created_at:       params.now,
            completed_at:     None,
            size_in_bytes:    None,
            is_restorable:    false,
            last_restored_at: None,
            restore_count:    0,
            restore_notes:    None,
            error_message:    None,
            version:          1,
        }
    }

    /// 既存のデータから復元する
    pub fn from_db(record: BackupRecord) -> Self {
        Self {
            id:               record.id,
            tenant_id:        record.tenant_id,
            name:             record.name,
            backup_type:      record.backup_type,
            status:           record.status,
            scope:            record.scope,
            description:      record.description,
            created_by:       record.created_by,
            created_at:       record.created_at,
            completed_at:     record.completed_at,
            size_in_bytes:    record.size_in_bytes,
            is_restorable:    record.is_restorable,
            last_restored_at: record.last_restored_at,
            restore_count:    record.restore_count,
            restore_notes:    record.restore_notes,
            error_message:    record.error_message,
            version:          record.version,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &BackupId {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn name(&self) -> &BackupName {
        &self.name
    }

    pub fn backup_type(&self) -> BackupType {
        self.backup_type
    }

    pub fn status(&self) -> BackupStatus {
        self.status
    }

    pub fn scope(&self) -> BackupScope {
        self.scope
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_by(&self) -> &ActorName {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn size_in_bytes(&self) -> Option<u64> {
        self.size_in_bytes
    }

    pub fn is_restorable(&self) -> bool {
        self.is_restorable
    }

    pub fn last_restored_at(&self) -> Option<DateTime<Utc>> {
        self.last_restored_at
    }

    pub fn restore_count(&self) -> u32 {
        self.restore_count
    }

    pub fn restore_notes(&self) -> Option<&str> {
        self.restore_notes.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // ビジネスロジック

    /// 実行結果を記録した新しいバックアップを返す
    ///
    /// # Errors
    ///
    /// 既に結果が確定している場合は `Conflict`（`Backup.AlreadyFinished`）。
    pub fn record_outcome(self, outcome: BackupOutcome, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status.is_finished() {
            return Err(DomainError::conflict(
                "Backup.AlreadyFinished",
                format!("バックアップ {} は既に {} です", self.id, self.status),
            ));
        }

        Ok(match outcome {
            BackupOutcome::Completed { size_in_bytes } => Self {
                status: BackupStatus::Completed,
                completed_at: Some(now),
                size_in_bytes: Some(size_in_bytes),
                is_restorable: true,
                error_message: None,
                version: self.version + 1,
                ..self
            },
            BackupOutcome::Failed { error_message } => Self {
                status: BackupStatus::Failed,
                completed_at: Some(now),
                is_restorable: false,
                error_message: Some(error_message),
                version: self.version + 1,
                ..self
            },
        })
    }

    /// 復元を記録した新しいバックアップを返す
    ///
    /// # Errors
    ///
    /// 完了していない、または復元不可のバックアップは `Conflict`（`Backup.NotRestorable`）。
    pub fn restore(self, notes: Option<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status != BackupStatus::Completed || !self.is_restorable {
            return Err(DomainError::conflict(
                "Backup.NotRestorable",
                format!("バックアップ {} は復元できません（状態: {}）", self.id, self.status),
            ));
        }

        Ok(Self {
            last_restored_at: Some(now),
            restore_count: self.restore_count + 1,
            restore_notes: notes,
            version: self.version + 1,
            ..self
        })
    }

    /// 削除可能か検証する
    ///
    /// # Errors
    ///
    /// 実行中のバックアップは `Conflict`（`Backup.InProgress`）。
    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.status == BackupStatus::InProgress {
            return Err(DomainError::conflict(
                "Backup.InProgress",
                format!("バックアップ {} は実行中のため削除できません", self.id),
            ));
        }
        Ok(())
    }
}

/// バックアップ一覧の検索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupFilter {
    pub status:          Option<BackupStatus>,
    pub backup_type:     Option<BackupType>,
    /// 名前・説明の部分一致（大文字小文字を区別しない）
    pub search:          Option<String>,
    /// 作成日時の降順（新しい順）で並べる
    pub sort_descending: bool,
}

impl BackupFilter {
    /// 条件に一致するか（インメモリ実装用）
    pub fn matches(&self, backup: &Backup) -> bool {
        if self.status.is_some_and(|status| status != backup.status()) {
            return false;
        }
        if self
            .backup_type
            .is_some_and(|backup_type| backup_type != backup.backup_type())
        {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            Some(term) => {
                backup.name().as_str().to_lowercase().contains(&term)
                    || backup
                        .description()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// テナントのバックアップ統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupStatistics {
    pub total_backups:      u64,
    pub completed_backups:  u64,
    pub failed_backups:     u64,
    pub pending_backups:    u64,
    pub total_size_bytes:   u64,
    pub last_completed_at:  Option<DateTime<Utc>>,
    pub total_restore_runs: u64,
}

impl BackupStatistics {
    /// バックアップ一覧から統計を集計する
    pub fn from_backups<'a>(backups: impl IntoIterator<Item = &'a Backup>) -> Self {
        backups
            .into_iter()
            .fold(Self::default(), |mut stats, backup| {
                stats.total_backups += 1;
                stats.total_restore_runs += u64::from(backup.restore_count());
                match backup.status() {
                    BackupStatus::Completed => {
                        stats.completed_backups += 1;
                        stats.total_size_bytes += backup.size_in_bytes().unwrap_or(0);
                        stats.last_completed_at = stats.last_completed_at.max(backup.completed_at());
                    }
                    BackupStatus::Failed => stats.failed_backups += 1,
                    BackupStatus::Pending | BackupStatus::InProgress => stats.pending_backups += 1,
                }
                stats
            })
    }
}
