//! バックアップの参照系ハンドラ

use async_trait::async_trait;
use stocker_domain::{
    DomainError,
    backup::{Backup, BackupFilter, BackupStatistics},
};
use stocker_shared::{PageRequest, PagedResult};

use super::{BackupUseCaseImpl, GetBackupByIdQuery, GetBackupStatisticsQuery, GetBackupsQuery};
use crate::{
    dispatch::{Handler, HandlerContext, TenantContext},
    error::CoreError,
};

#[async_trait]
impl Handler<GetBackupByIdQuery> for BackupUseCaseImpl {
    async fn handle(
        &self,
        request: GetBackupByIdQuery,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<Backup, CoreError> {
        ctx.ensure_active()?;
        self.load(&request.backup_id, ctx.tenant_id()).await
    }
}

#[async_trait]
impl Handler<GetBackupsQuery> for BackupUseCaseImpl {
    async fn handle(
        &self,
        request: GetBackupsQuery,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<PagedResult<Backup>, CoreError> {
        let page =
            PageRequest::new(request.page_number, request.page_size).map_err(DomainError::from)?;
        let filter = BackupFilter {
            status:          request.status,
            backup_type:     request.backup_type,
            search:          request
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sort_descending: request.sort_descending,
        };

        ctx.ensure_active()?;
        let backups = self
            .backups
            .find_page(ctx.tenant_id(), &filter, page)
            .await?;
        Ok(backups)
    }
}

#[async_trait]
impl Handler<GetBackupStatisticsQuery> for BackupUseCaseImpl {
    async fn handle(
        &self,
        _request: GetBackupStatisticsQuery,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<BackupStatistics, CoreError> {
        ctx.ensure_active()?;
        Ok(self.backups.statistics(ctx.tenant_id()).await?)
    }
}
