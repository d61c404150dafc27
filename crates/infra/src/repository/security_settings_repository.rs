//! # SecuritySettingsRepository
//!
//! テナントのセキュリティ設定の永続化を担当するリポジトリ。
//!
//! ポリシーは JSONB カラムに値オブジェクトをそのまま格納する。
//! 読み出し時は値オブジェクトのコンストラクタで再検証する。
//!
//! 2 つのポリシーは同じ行に保存するため、保存はバージョン検査付きで行う。
//! 読み取り後に他の更新が入っていた場合は `InfraError::conflict` を返す。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, types::Json};
use stocker_domain::{
    security_settings::{PasswordPolicy, SecuritySettings, SessionPolicy},
    tenant::TenantId,
};
use uuid::Uuid;

use crate::{
    db::{TenantConnection, TxContext},
    error::InfraError,
};

/// セキュリティ設定リポジトリトレイト
#[async_trait]
pub trait SecuritySettingsRepository: Send + Sync {
    /// テナントの設定を取得する（未保存なら `None`）
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<SecuritySettings>, InfraError>;

    /// バージョンを検査して設定を保存する
    ///
    /// `expected_version` が 0 なら新規作成、それ以外は読み取り時のバージョンと
    /// 一致する場合だけ更新する。作成済み・不一致の場合は `Conflict`。
    async fn save_with_version_check(
        &self,
        tx: &mut TxContext,
        settings: &SecuritySettings,
        expected_version: u32,
    ) -> Result<(), InfraError>;
}

/// JSONB に格納するパスワードポリシー
#[derive(Debug, Serialize, Deserialize)]
struct PasswordPolicyDocument {
    min_length:            u16,
    require_uppercase:     bool,
    require_lowercase:     bool,
    require_numbers:       bool,
    require_special_chars: bool,
    expiry_days:           u16,
    history_count:         u8,
}

impl From<&PasswordPolicy> for PasswordPolicyDocument {
    fn from(policy: &PasswordPolicy) -> Self {
        Self {
            min_length:            policy.min_length(),
            require_uppercase:     policy.require_uppercase(),
            require_lowercase:     policy.require_lowercase(),
            require_numbers:       policy.require_numbers(),
            require_special_chars: policy.require_special_chars(),
            expiry_days:           policy.expiry_days(),
            history_count:         policy.history_count(),
        }
    }
}

impl TryFrom<PasswordPolicyDocument> for PasswordPolicy {
    type Error = InfraError;

    fn try_from(doc: PasswordPolicyDocument) -> Result<Self, Self::Error> {
        PasswordPolicy::new(
            doc.min_length,
            doc.require_uppercase,
            doc.require_lowercase,
            doc.require_numbers,
            doc.require_special_chars,
            doc.expiry_days,
            doc.history_count,
        )
        .map_err(|e| InfraError::corrupted(e.to_string()))
    }
}

/// JSONB に格納するセッションポリシー
#[derive(Debug, Serialize, Deserialize)]
struct SessionPolicyDocument {
    max_login_attempts:      u16,
    lockout_minutes:         u16,
    session_timeout_minutes: u16,
    require_mfa:             bool,
}

impl From<&SessionPolicy> for SessionPolicyDocument {
    fn from(policy: &SessionPolicy) -> Self {
        Self {
            max_login_attempts:      policy.max_login_attempts(),
            lockout_minutes:         policy.lockout_minutes(),
            session_timeout_minutes: policy.session_timeout_minutes(),
            require_mfa:             policy.require_mfa(),
        }
    }
}

impl TryFrom<SessionPolicyDocument> for SessionPolicy {
    type Error = InfraError;

    fn try_from(doc: SessionPolicyDocument) -> Result<Self, Self::Error> {
        SessionPolicy::new(
            doc.max_login_attempts,
            doc.lockout_minutes,
            doc.session_timeout_minutes,
            doc.require_mfa,
        )
        .map_err(|e| InfraError::corrupted(e.to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct SecuritySettingsRow {
    tenant_id:       Uuid,
    password_policy: serde_json::Value,
    session_policy:  serde_json::Value,
    updated_at:      DateTime<Utc>,
    version:         i32,
}

impl TryFrom<SecuritySettingsRow> for SecuritySettings {
    type Error = InfraError;

    fn try_from(row: SecuritySettingsRow) -> Result<Self, Self::Error> {
        let password: PasswordPolicyDocument = serde_json::from_value(row.password_policy)?;
        let session: SessionPolicyDocument = serde_json::from_value(row.session_policy)?;

        Ok(SecuritySettings::from_db(
            TenantId::from_uuid(row.tenant_id),
            password.try_into()?,
            session.try_into()?,
            row.updated_at,
            row.version.max(0) as u32,
        ))
    }
}

/// PostgreSQL 実装の SecuritySettingsRepository
#[derive(Debug, Clone)]
pub struct PostgresSecuritySettingsRepository {
    pool: PgPool,
}

impl PostgresSecuritySettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecuritySettingsRepository for PostgresSecuritySettingsRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id))]
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<SecuritySettings>, InfraError> {
        let mut conn = TenantConnection::acquire(&self.pool, tenant_id).await?;

        let row = sqlx::query_as::<_, SecuritySettingsRow>(
            r#"
            SELECT tenant_id, password_policy, session_policy, updated_at, version
            FROM tenant_security_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(SecuritySettings::try_from).transpose()
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(tenant_id = %settings.tenant_id(), expected_version = expected_version)
    )]
    async fn save_with_version_check(
        &self,
        tx: &mut TxContext,
        settings: &SecuritySettings,
        expected_version: u32,
    ) -> Result<(), InfraError> {
        let updated_at = settings
            .updated_at()
            .ok_or_else(|| InfraError::unexpected("未更新のセキュリティ設定は保存できません"))?;
        let password_policy = Json(PasswordPolicyDocument::from(settings.password_policy()));
        let session_policy = Json(SessionPolicyDocument::from(settings.session_policy()));

        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO tenant_security_settings
                    (tenant_id, password_policy, session_policy, updated_at, version)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id) DO NOTHING
                "#,
            )
            .bind(settings.tenant_id().as_uuid())
            .bind(password_policy)
            .bind(session_policy)
            .bind(updated_at)
            .bind(settings.version() as i32)
            .execute(tx.conn())
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE tenant_security_settings
                SET password_policy = $2,
                    session_policy = $3,
                    updated_at = $4,
                    version = $5
                WHERE tenant_id = $1 AND version = $6
                "#,
            )
            .bind(settings.tenant_id().as_uuid())
            .bind(password_policy)
            .bind(session_policy)
            .bind(updated_at)
            .bind(settings.version() as i32)
            .bind(expected_version as i32)
            .execute(tx.conn())
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "SecuritySettings",
                settings.tenant_id().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::InfraErrorKind;

    fn row(password_policy: serde_json::Value) -> SecuritySettingsRow {
        SecuritySettingsRow {
            tenant_id: Uuid::now_v7(),
            password_policy,
            session_policy: serde_json::to_value(SessionPolicyDocument::from(
                &SessionPolicy::default(),
            ))
            .unwrap(),
            updated_at: Utc::now(),
            version: 3,
        }
    }

    #[test]
    fn test_jsonbのポリシーから設定を復元できる() {
        let policy = PasswordPolicy::new(12, true, true, false, true, 60, 3).unwrap();
        let json = serde_json::to_value(PasswordPolicyDocument::from(&policy)).unwrap();

        let settings = SecuritySettings::try_from(row(json)).unwrap();

        assert_eq!(settings.password_policy(), &policy);
        assert_eq!(settings.session_policy(), &SessionPolicy::default());
        assert_eq!(settings.version(), 3);
    }

    #[test]
    fn test_範囲外のポリシーはcorruptedになる() {
        let json = serde_json::json!({
            "min_length": 1,
            "require_uppercase": true,
            "require_lowercase": true,
            "require_numbers": true,
            "require_special_chars": false,
            "expiry_days": 90,
            "history_count": 5
        });

        let error = SecuritySettings::try_from(row(json)).unwrap_err();

        assert!(matches!(error.kind(), InfraErrorKind::Corrupted(_)));
    }

    #[test]
    fn test_形式が違うjsonはserializationになる() {
        let error = SecuritySettings::try_from(row(serde_json::json!({"min": 8}))).unwrap_err();

        assert!(matches!(error.kind(), InfraErrorKind::Serialization(_)));
    }
}
