//! # セキュリティ設定
//!
//! テナントごとのパスワードポリシーとセッションポリシー。
//!
//! ## 設計方針
//!
//! 設定項目は名前付きの更新メソッド（[`SecuritySettings::update_password_policy`]、
//! [`SecuritySettings::update_session_policy`]）でのみ変更する。
//! 各ポリシーは値オブジェクトとして生成時に範囲を検証するため、
//! 存在しない項目名や範囲外の値を持つ設定は作れない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, tenant::TenantId};

// =========================================================================
// PasswordPolicy（パスワードポリシー）
// =========================================================================

/// パスワードポリシー（値オブジェクト）
///
/// # 不変条件
///
/// - `min_length`: 6〜128
/// - `expiry_days`: 0〜365（0 は無期限）
/// - `history_count`: 0〜24
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    min_length:            u16,
    require_uppercase:     bool,
    require_lowercase:     bool,
    require_numbers:       bool,
    require_special_chars: bool,
    expiry_days:           u16,
    history_count:         u8,
}

impl PasswordPolicy {
    pub const INVALID_CODE: &'static str = "PasswordPolicy.Invalid";

    pub fn new(
        min_length: u16,
        require_uppercase: bool,
        require_lowercase: bool,
        require_numbers: bool,
        require_special_chars: bool,
        expiry_days: u16,
        history_count: u8,
    ) -> DomainResult<Self> {
        ensure_range("パスワードの最小文字数", min_length.into(), 6, 128, Self::INVALID_CODE)?;
        ensure_range("パスワードの有効期限（日）", expiry_days.into(), 0, 365, Self::INVALID_CODE)?;
        ensure_range("パスワード履歴数", history_count.into(), 0, 24, Self::INVALID_CODE)?;

        Ok(Self {
            min_length,
            require_uppercase,
            require_lowercase,
            require_numbers,
            require_special_chars,
            expiry_days,
            history_count,
        })
    }

    pub fn min_length(&self) -> u16 {
        self.min_length
    }

    pub fn require_uppercase(&self) -> bool {
        self.require_uppercase
    }

    pub fn require_lowercase(&self) -> bool {
        self.require_lowercase
    }

    pub fn require_numbers(&self) -> bool {
        self.require_numbers
    }

    pub fn require_special_chars(&self) -> bool {
        self.require_special_chars
    }

    pub fn expiry_days(&self) -> u16 {
        self.expiry_days
    }

    pub fn history_count(&self) -> u8 {
        self.history_count
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length:            8,
            require_uppercase:     true,
            require_lowercase:     true,
            require_numbers:       true,
            require_special_chars: false,
            expiry_days:           90,
            history_count:         5,
        }
    }
}

// =========================================================================
// SessionPolicy（セッションポリシー）
// =========================================================================

/// セッション・ログイン制御ポリシー（値オブジェクト）
///
/// # 不変条件
///
/// - `max_login_attempts`: 1〜20
/// - `lockout_minutes`: 1〜1440
/// - `session_timeout_minutes`: 5〜1440
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    max_login_attempts:      u16,
    lockout_minutes:         u16,
    session_timeout_minutes: u16,
    require_mfa:             bool,
}

impl SessionPolicy {
    pub const INVALID_CODE: &'static str = "SessionPolicy.Invalid";

    pub fn new(
        max_login_attempts: u16,
        lockout_minutes: u16,
        session_timeout_minutes: u16,
        require_mfa: bool,
    ) -> DomainResult<Self> {
        ensure_range("ログイン試行回数の上限", max_login_attempts.into(), 1, 20, Self::INVALID_CODE)?;
        ensure_range("ロックアウト時間（分）", lockout_minutes.into(), 1, 1440, Self::INVALID_CODE)?;
        ensure_range(
            "セッションタイムアウト（分）",
            session_timeout_minutes.into(),
            5,
            1440,
            Self::INVALID_CODE,
        )?;

        Ok(Self {
            max_login_attempts,
            lockout_minutes,
            session_timeout_minutes,
            require_mfa,
        })
    }

    pub fn max_login_attempts(&self) -> u16 {
        self.max_login_attempts
    }

    pub fn lockout_minutes(&self) -> u16 {
        self.lockout_minutes
    }

    pub fn session_timeout_minutes(&self) -> u16 {
        self.session_timeout_minutes
    }

    pub fn require_mfa(&self) -> bool {
        self.require_mfa
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_login_attempts:      5,
            lockout_minutes:         30,
            session_timeout_minutes: 30,
            require_mfa:             false,
        }
    }
}

fn ensure_range(label: &str, value: u32, min: u32, max: u32, code: &'static str) -> DomainResult<()> {
    if !(min..=max).contains(&value) {
        return Err(DomainError::validation(
            code,
            format!("{label}は {min} 以上 {max} 以下である必要があります（指定値: {value}）"),
        ));
    }
    Ok(())
}

// =========================================================================
// SecuritySettings（セキュリティ設定エンティティ）
// =========================================================================

/// テナントのセキュリティ設定
///
/// テナントごとに 1 件。未作成のテナントには [`SecuritySettings::defaults_for`] を使う。
///
/// パスワードポリシーとセッションポリシーは 1 行にまとめて保存するため、
/// 並行する更新が互いを巻き戻さないよう `version` で楽観的ロックを行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySettings {
    tenant_id:       TenantId,
    password_policy: PasswordPolicy,
    session_policy:  SessionPolicy,
    updated_at:      Option<DateTime<Utc>>,
    /// 未保存なら 0
    version:         u32,
}

impl SecuritySettings {
    /// 既定値の設定（未保存）
    pub fn defaults_for(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            password_policy: PasswordPolicy::default(),
            session_policy: SessionPolicy::default(),
            updated_at: None,
            version: 0,
        }
    }

    pub fn from_db(
        tenant_id: TenantId,
        password_policy: PasswordPolicy,
        session_policy: SessionPolicy,
        updated_at: DateTime<Utc>,
        version: u32,
    ) -> Self {
        Self {
            tenant_id,
            password_policy,
            session_policy,
            updated_at: Some(updated_at),
            version,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    pub fn session_policy(&self) -> &SessionPolicy {
        &self.session_policy
    }

    /// 最終更新日時（未保存の既定値なら `None`）
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// パスワードポリシーを差し替えた新しい設定を返す
    pub fn update_password_policy(self, policy: PasswordPolicy, now: DateTime<Utc>) -> Self {
        Self {
            password_policy: policy,
            updated_at: Some(now),
            version: self.version + 1,
            ..self
        }
    }

    /// セッションポリシーを差し替えた新しい設定を返す
    pub fn update_session_policy(self, policy: SessionPolicy, now: DateTime<Utc>) -> Self {
        Self {
            session_policy: policy,
            updated_at: Some(now),
            version: self.version + 1,
            ..self
        }
    }
}
