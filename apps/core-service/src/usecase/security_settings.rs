//! # セキュリティ設定ユースケース
//!
//! テナントのパスワードポリシー・セッションポリシーの参照と更新。
//!
//! 設定が未作成のテナントには既定値を返し、最初の更新で保存する。
//! 更新はポリシー単位で行い、任意プロパティの書き換えは受け付けない。

use std::sync::Arc;

use async_trait::async_trait;
use stocker_domain::{
    clock::Clock,
    security_settings::{PasswordPolicy, SecuritySettings, SessionPolicy},
    tenant::TenantId,
};
use stocker_infra::{db::TransactionManager, repository::SecuritySettingsRepository};
use stocker_shared::{
    event_log::event::{action, category, entity_type, result},
    log_business_event,
};

use crate::{
    dispatch::{Handler, HandlerContext, Request, RequestKind, TenantContext, TenantScoped},
    error::CoreError,
};

/// テナントのセキュリティ設定を取得する
#[derive(Debug, Clone, Copy)]
pub struct GetSecuritySettingsQuery;

impl Request for GetSecuritySettingsQuery {
    type Output = SecuritySettings;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "GetSecuritySettingsQuery";
}

/// パスワードポリシーを更新する
///
/// ポリシーの範囲検証は [`PasswordPolicy::new`] の時点で済んでいる。
#[derive(Debug, Clone, Copy)]
pub struct UpdatePasswordPolicyCommand {
    pub policy: PasswordPolicy,
}

impl Request for UpdatePasswordPolicyCommand {
    type Output = SecuritySettings;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "UpdatePasswordPolicyCommand";
}

/// セッションポリシーを更新する
#[derive(Debug, Clone, Copy)]
pub struct UpdateSessionPolicyCommand {
    pub policy: SessionPolicy,
}

impl Request for UpdateSessionPolicyCommand {
    type Output = SecuritySettings;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "UpdateSessionPolicyCommand";
}

/// セキュリティ設定ユースケース
pub struct SecuritySettingsUseCaseImpl {
    settings:   Arc<dyn SecuritySettingsRepository>,
    tx_manager: Arc<dyn TransactionManager>,
    clock:      Arc<dyn Clock>,
}

impl SecuritySettingsUseCaseImpl {
    pub fn new(
        settings: Arc<dyn SecuritySettingsRepository>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            tx_manager,
            clock,
        }
    }

    async fn current(&self, tenant_id: &TenantId) -> Result<SecuritySettings, CoreError> {
        Ok(self
            .settings
            .find_by_tenant(tenant_id)
            .await?
            .unwrap_or_else(|| SecuritySettings::defaults_for(tenant_id.clone())))
    }

    /// 読み取り時のバージョンを検査して保存する
    ///
    /// 他の更新が先にコミットされていた場合は `Conflict`（`SecuritySettings.Conflict`）。
    async fn save(
        &self,
        settings: &SecuritySettings,
        expected_version: u32,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<(), CoreError> {
        ctx.ensure_active()?;
        let mut tx = self.tx_manager.begin(ctx.tenant_id()).await?;
        self.settings
            .save_with_version_check(&mut tx, settings, expected_version)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Handler<GetSecuritySettingsQuery> for SecuritySettingsUseCaseImpl {
    async fn handle(
        &self,
        _request: GetSecuritySettingsQuery,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<SecuritySettings, CoreError> {
        ctx.ensure_active()?;
        self.current(ctx.tenant_id()).await
    }
}

#[async_trait]
impl Handler<UpdatePasswordPolicyCommand> for SecuritySettingsUseCaseImpl {
    async fn handle(
        &self,
        request: UpdatePasswordPolicyCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<SecuritySettings, CoreError> {
        ctx.ensure_active()?;
        let current = self.current(ctx.tenant_id()).await?;
        let expected_version = current.version();
        let updated = current.update_password_policy(request.policy, self.clock.now());
        self.save(&updated, expected_version, ctx).await?;

        log_business_event!(
            event.category = category::SECURITY_SETTINGS,
            event.action = action::PASSWORD_POLICY_UPDATED,
            event.entity_type = entity_type::SECURITY_SETTINGS,
            event.entity_id = %ctx.tenant_id(),
            event.tenant_id = %ctx.tenant_id(),
            event.result = result::SUCCESS,
            "パスワードポリシーを更新しました"
        );

        Ok(updated)
    }
}

#[async_trait]
impl Handler<UpdateSessionPolicyCommand> for SecuritySettingsUseCaseImpl {
    async fn handle(
        &self,
        request: UpdateSessionPolicyCommand,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<SecuritySettings, CoreError> {
        ctx.ensure_active()?;
        let current = self.current(ctx.tenant_id()).await?;
        let expected_version = current.version();
        let updated = current.update_session_policy(request.policy, self.clock.now());
        self.save(&updated, expected_version, ctx).await?;

        log_business_event!(
            event.category = category::SECURITY_SETTINGS,
            event.action = action::SESSION_POLICY_UPDATED,
            event.entity_type = entity_type::SECURITY_SETTINGS,
            event.entity_id = %ctx.tenant_id(),
            event.tenant_id = %ctx.tenant_id(),
            event.result = result::SUCCESS,
            "セッションポリシーを更新しました"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use stocker_domain::clock::FixedClock;
    use stocker_infra::mock::{MockSecuritySettingsRepository, MockTransactionManager};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    fn setup(
        tx_manager: MockTransactionManager,
    ) -> (MockSecuritySettingsRepository, SecuritySettingsUseCaseImpl) {
        let settings = MockSecuritySettingsRepository::new();
        let sut = SecuritySettingsUseCaseImpl::new(
            Arc::new(settings.clone()),
            Arc::new(tx_manager),
            Arc::new(FixedClock::new(now())),
        );
        (settings, sut)
    }

    #[tokio::test]
    async fn test_未作成のテナントには既定値を返す() {
        let (_, sut) = setup(MockTransactionManager::new());
        let tenant_id = TenantId::new();
        let ctx = HandlerContext::for_tenant(tenant_id.clone());

        let settings = sut.handle(GetSecuritySettingsQuery, &ctx).await.unwrap();

        assert_eq!(settings, SecuritySettings::defaults_for(tenant_id));
        assert_eq!(settings.updated_at(), None);
    }

    #[tokio::test]
    async fn test_パスワードポリシーを更新すると保存される() {
        let (repo, sut) = setup(MockTransactionManager::new());
        let tenant_id = TenantId::new();
        let ctx = HandlerContext::for_tenant(tenant_id.clone());
        let policy = PasswordPolicy::new(12, true, true, true, true, 30, 10).unwrap();

        let updated = sut
            .handle(UpdatePasswordPolicyCommand { policy }, &ctx)
            .await
            .unwrap();

        assert_eq!(updated.password_policy(), &policy);
        assert_eq!(updated.session_policy(), &SessionPolicy::default());
        assert_eq!(updated.updated_at(), Some(now()));
        assert_eq!(repo.get(&tenant_id), Some(updated));
    }

    #[tokio::test]
    async fn test_セッションポリシーの更新はパスワードポリシーを保持する() {
        let (repo, sut) = setup(MockTransactionManager::new());
        let tenant_id = TenantId::new();
        let password = PasswordPolicy::new(10, false, true, true, false, 0, 0).unwrap();
        repo.put(SecuritySettings::defaults_for(tenant_id.clone()).update_password_policy(
            password,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let ctx = HandlerContext::for_tenant(tenant_id.clone());
        let session = SessionPolicy::new(3, 30, 60, true).unwrap();

        let updated = sut
            .handle(UpdateSessionPolicyCommand { policy: session }, &ctx)
            .await
            .unwrap();

        assert_eq!(updated.password_policy(), &password);
        assert_eq!(updated.session_policy(), &session);
        assert_eq!(repo.get(&tenant_id).unwrap().updated_at(), Some(now()));
    }

    #[tokio::test]
    async fn test_コミット失敗時は設定が保存されない() {
        let (repo, sut) = setup(MockTransactionManager::failing_commit());
        let tenant_id = TenantId::new();
        let ctx = HandlerContext::for_tenant(tenant_id.clone());

        let result = sut
            .handle(
                UpdateSessionPolicyCommand {
                    policy: SessionPolicy::default(),
                },
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(CoreError::Infra(_))));
        assert!(repo.get(&tenant_id).is_none());
    }

    #[tokio::test]
    async fn test_並行したポリシー更新は後の更新がconflictになり先の更新を巻き戻さない() {
        let (repo, sut) = setup(MockTransactionManager::with_begin_barrier(2));
        let tenant_id = TenantId::new();
        let ctx = HandlerContext::for_tenant(tenant_id.clone());
        let password = PasswordPolicy::new(16, true, true, true, true, 60, 12).unwrap();
        let session = SessionPolicy::new(3, 60, 15, true).unwrap();

        let (by_password, by_session) = tokio::join!(
            sut.handle(UpdatePasswordPolicyCommand { policy: password }, &ctx),
            sut.handle(UpdateSessionPolicyCommand { policy: session }, &ctx),
        );

        let (saved, error) = match (by_password, by_session) {
            (Ok(saved), Err(CoreError::Domain(error)))
            | (Err(CoreError::Domain(error)), Ok(saved)) => (saved, error),
            other => panic!("片方だけが成功することを期待しましたが {other:?} でした"),
        };
        assert_eq!(error.code(), "SecuritySettings.Conflict");
        assert_eq!(repo.get(&tenant_id), Some(saved));
    }
}
