//! バックアップの更新系ハンドラ
//!
//! 書き込みはすべて `TxContext` 経由で行い、最後に 1 回だけコミットする。
//! 途中で失敗した場合は `TxContext` のドロップでロールバックされる。

use async_trait::async_trait;
use stocker_domain::{
    backup::{ActorName, Backup, BackupId, BackupName, BackupOutcome, BackupScope, NewBackup},
    backup_quota::{BackupQuota, DEFAULT_MAX_BACKUPS_PER_MONTH},
};
use stocker_shared::{
    event_log::event::{action, category, entity_type, result},
    log_business_event,
};

use super::{
    BackupUseCaseImpl,
    CreateBackupCommand,
    DeleteBackupCommand,
    RecordBackupResultCommand,
    RestoreBackupCommand,
};
use crate::{
    dispatch::{Handler, HandlerContext, TenantContext},
    error::CoreError,
};

#[async_trait]
impl Handler<CreateBackupCommand> for BackupUseCaseImpl {
    /// バックアップを受け付ける
    ///
    /// 1. 入力を値オブジェクトに変換（名前、対象、操作者）
    /// 2. 月間バックアップ枠を消費（未設定なら既定の枠を作成）
    /// 3. バックアップの挿入と枠の保存を同じトランザクションでコミット
    ///
    /// 枠は読み取り時のバージョンを検査して保存する。並行する作成で先に枠が
    /// 更新されていた場合は `Conflict`（`BackupQuota.Conflict`）になり、何も書き込まれない。
    async fn handle(
        &self,
        request: CreateBackupCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<BackupId, CoreError> {
        let tenant_id = ctx.tenant_id();
        let name = BackupName::new(request.backup_name)?;
        let scope = BackupScope::new(
            request.includes_database,
            request.includes_files,
            request.includes_configuration,
        )?;
        let created_by = ActorName::new(request.created_by)?;
        let now = self.clock.now();

        ctx.ensure_active()?;
        let current = self
            .quotas
            .find_by_tenant(tenant_id)
            .await?
            .unwrap_or_else(|| {
                BackupQuota::new(tenant_id.clone(), DEFAULT_MAX_BACKUPS_PER_MONTH, now)
            });
        let expected_version = current.version();
        let quota = current.consume(now)?;

        let backup = Backup::new(NewBackup {
            id: BackupId::new(),
            tenant_id: tenant_id.clone(),
            name,
            backup_type: request.backup_type,
            scope,
            description: request.description.filter(|d| !d.trim().is_empty()),
            created_by,
            now,
        });

        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(tenant_id).await?;
        self.backups.insert(&mut tx, &backup).await?;
        self.quotas
            .save_with_version_check(&mut tx, &quota, expected_version)
            .await?;
        tx.commit().await?;

        log_business_event!(
            event.category = category::BACKUP,
            event.action = action::BACKUP_REQUESTED,
            event.entity_type = entity_type::BACKUP,
            event.entity_id = %backup.id(),
            event.tenant_id = %tenant_id,
            event.result = result::SUCCESS,
            backup.remaining_quota = quota.remaining(now),
            "バックアップを受け付けました"
        );

        Ok(backup.id().clone())
    }
}

#[async_trait]
impl Handler<RecordBackupResultCommand> for BackupUseCaseImpl {
    async fn handle(
        &self,
        request: RecordBackupResultCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<Backup, CoreError> {
        let tenant_id = ctx.tenant_id();

        ctx.ensure_active()?;
        let backup = self.load(&request.backup_id, tenant_id).await?;
        let expected_version = backup.version();
        let event_action = match request.outcome {
            BackupOutcome::Completed { .. } => action::BACKUP_COMPLETED,
            BackupOutcome::Failed { .. } => action::BACKUP_FAILED,
        };
        let updated = backup.record_outcome(request.outcome, self.clock.now())?;

        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(tenant_id).await?;
        self.backups
            .update_with_version_check(&mut tx, &updated, expected_version)
            .await?;
        tx.commit().await?;

        log_business_event!(
            event.category = category::BACKUP,
            event.action = event_action,
            event.entity_type = entity_type::BACKUP,
            event.entity_id = %updated.id(),
            event.tenant_id = %tenant_id,
            event.result = result::SUCCESS,
            "バックアップ結果を記録しました"
        );

        Ok(updated)
    }
}

#[async_trait]
impl Handler<DeleteBackupCommand> for BackupUseCaseImpl {
    async fn handle(
        &self,
        request: DeleteBackupCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<(), CoreError> {
        let tenant_id = ctx.tenant_id();

        ctx.ensure_active()?;
        let backup = self.load(&request.backup_id, tenant_id).await?;
        backup.ensure_deletable()?;

        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(tenant_id).await?;
        self.backups.delete(&mut tx, backup.id(), tenant_id).await?;
        tx.commit().await?;

        log_business_event!(
            event.category = category::BACKUP,
            event.action = action::BACKUP_DELETED,
            event.entity_type = entity_type::BACKUP,
            event.entity_id = %backup.id(),
            event.tenant_id = %tenant_id,
            event.result = result::SUCCESS,
            "バックアップを削除しました"
        );

        Ok(())
    }
}

#[async_trait]
impl Handler<RestoreBackupCommand> for BackupUseCaseImpl {
    async fn handle(
        &self,
        request: RestoreBackupCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<Backup, CoreError> {
        let tenant_id = ctx.tenant_id();

        ctx.ensure_active()?;
        let backup = self.load(&request.backup_id, tenant_id).await?;
        let expected_version = backup.version();
        let notes = request.notes.filter(|n| !n.trim().is_empty());
        let restored = backup.restore(notes, self.clock.now())?;

        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(tenant_id).await?;
        self.backups
            .update_with_version_check(&mut tx, &restored, expected_version)
            .await?;
        tx.commit().await?;

        log_business_event!(
            event.category = category::BACKUP,
            event.action = action::BACKUP_RESTORED,
            event.entity_type = entity_type::BACKUP,
            event.entity_id = %restored.id(),
            event.tenant_id = %tenant_id,
            event.result = result::SUCCESS,
            backup.restore_count = restored.restore_count(),
            "バックアップから復元しました"
        );

        Ok(restored)
    }
}
