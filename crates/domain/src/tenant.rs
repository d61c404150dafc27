//! # テナント
//!
//! マルチテナント SaaS アーキテクチャにおけるテナント（顧客企業）のモデル。
//!
//! ## マルチテナントとは
//!
//! 単一のアプリケーションインスタンスで複数の顧客（テナント）にサービスを提供する
//! アーキテクチャ。各テナントのデータは論理的に分離され、他のテナントからは
//! アクセスできない。
//!
//! ## テナント ID の受け取り方
//!
//! テナント ID は認証コンテキストから文字列として届く。[`TenantId::parse`] で
//! 空・不正形式を検証してから型付きの `TenantId` に変換する。
//! 検証を通っていない文字列がハンドラに渡ることはない。
//!
//! ## 使用例
//!
//! ```rust
//! use stocker_domain::{ErrorCategory, tenant::TenantId};
//!
//! let tenant_id = TenantId::parse("0190a8a0-7c4e-7a3b-9d8e-1f2a3b4c5d6e").unwrap();
//! println!("テナント: {}", tenant_id);
//!
//! let error = TenantId::parse("").unwrap_err();
//! assert_eq!(error.category(), ErrorCategory::Validation);
//! ```

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use uuid::Uuid;

use crate::{DomainError, DomainResult};

/// テナント ID が指定されていない
pub const TENANT_MISSING: &str = "Tenant.Missing";
/// テナント ID の形式が不正
pub const TENANT_INVALID: &str = "Tenant.Invalid";
/// テナントが存在しない
pub const TENANT_NOT_FOUND: &str = "Tenant.NotFound";
/// テナントが利用停止中
pub const TENANT_SUSPENDED: &str = "Tenant.Suspended";

/// テナント（顧客企業）の一意識別子
///
/// すべてのテナントスコープのエンティティ（Backup, SecuritySettings など）は
/// この `TenantId` を持ち、テナント間のデータ分離を保証する。
///
/// テナント ID は認証トークンから取得し、クライアントからの
/// 直接指定は受け付けない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct TenantId(Uuid);

impl TenantId {
   /// 新しいテナント ID を生成する（UUID v7）
   pub fn new() -> Self {
      Self(Uuid::now_v7())
   }

   /// 既存の UUID からテナント ID を作成する
   pub fn from_uuid(uuid: Uuid) -> Self {
      Self(uuid)
   }

   /// 内部の UUID 参照を取得する
   pub fn as_uuid(&self) -> &Uuid {
      &self.0
   }

   /// 認証コンテキストから届いたテナント ID 文字列を検証する
   ///
   /// # エラー
   ///
   /// - 空文字列、空白のみ、nil UUID → `Validation`（`Tenant.Missing`）
   /// - UUID として解釈できない → `Validation`（`Tenant.Invalid`）
   pub fn parse(raw: &str) -> DomainResult<Self> {
      let raw = raw.trim();
      if raw.is_empty() {
         return Err(DomainError::validation(
            TENANT_MISSING,
            "テナント ID が指定されていません",
         ));
      }

      let uuid = Uuid::parse_str(raw).map_err(|_| {
         DomainError::validation(TENANT_INVALID, format!("テナント ID の形式が不正です: {raw}"))
      })?;

      if uuid.is_nil() {
         return Err(DomainError::validation(
            TENANT_MISSING,
            "テナント ID が指定されていません",
         ));
      }

      Ok(Self(uuid))
   }
}

impl Default for TenantId {
   fn default() -> Self {
      Self::new()
   }
}

// =========================================================================
// TenantName（テナント名）
// =========================================================================

define_validated_string! {
   /// テナント名（値オブジェクト）
   ///
   /// # 不変条件
   ///
   /// - 空文字列ではない
   /// - 最大 255 文字（DB: `VARCHAR(255)`）
   pub struct TenantName {
      label: "テナント名",
      max_length: 255,
   }
}

// =========================================================================
// TenantStatus（テナント状態）
// =========================================================================

/// テナントの利用状態
#[derive(
   Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TenantStatus {
   /// 利用中
   Active,
   /// 利用停止中
   Suspended,
}

impl std::str::FromStr for TenantStatus {
   type Err = DomainError;

   fn from_str(s: &str) -> Result<Self, Self::Err> {
      match s {
         "active" => Ok(Self::Active),
         "suspended" => Ok(Self::Suspended),
         _ => Err(DomainError::validation(
            "TenantStatus.Invalid",
            format!("不正なテナント状態: {s}"),
         )),
      }
   }
}

// =========================================================================
// Tenant（テナントエンティティ）
// =========================================================================

/// テナント（顧客企業）エンティティ
///
/// # 不変条件
///
/// - `id` はシステム内で一意
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenant {
   id:     TenantId,
   name:   TenantName,
   status: TenantStatus,
}

impl Tenant {
   /// 新規テナントを作成する（利用中）
   pub fn new(name: TenantName) -> Self {
      Self {
         id: TenantId::new(),
         name,
         status: TenantStatus::Active,
      }
   }

   /// データベースからテナントを復元する
   pub fn from_db(id: TenantId, name: TenantName, status: TenantStatus) -> Self {
      Self { id, name, status }
   }

   pub fn id(&self) -> &TenantId {
      &self.id
   }

   pub fn name(&self) -> &TenantName {
      &self.name
   }

   pub fn status(&self) -> TenantStatus {
      self.status
   }

   /// 状態を変更した新しいテナントを返す
   ///
   /// 同じ状態への変更は `Conflict`。
   pub fn with_status(self, status: TenantStatus) -> DomainResult<Self> {
      if self.status == status {
         return Err(DomainError::conflict(
            "Tenant.StatusUnchanged",
            format!("テナントは既に {status} です"),
         ));
      }
      Ok(Self { status, ..self })
   }

   /// テナントスコープの操作を受け付けられるか検証する
   pub fn ensure_active(&self) -> DomainResult<()> {
      match self.status {
         TenantStatus::Active => Ok(()),
         TenantStatus::Suspended => Err(DomainError::forbidden(
            TENANT_SUSPENDED,
            format!("テナント {} は利用停止中です", self.id),
         )),
      }
   }
}

#[cfg(test)]
mod tests {
   use rstest::rstest;

   use super::*;
   use crate::ErrorCategory;

   // TenantId::parse のテスト

   #[test]
   fn test_テナントidは正しいuuidを受け入れる() {
      let uuid = Uuid::now_v7();

      let tenant_id = TenantId::parse(&uuid.to_string()).unwrap();

      assert_eq!(tenant_id.as_uuid(), &uuid);
   }

   #[test]
   fn test_テナントidは前後の空白を無視する() {
      let uuid = Uuid::now_v7();

      let tenant_id = TenantId::parse(&format!("  {uuid} ")).unwrap();

      assert_eq!(tenant_id, TenantId::from_uuid(uuid));
   }

   #[rstest]
   #[case("")]
   #[case("   ")]
   #[case("00000000-0000-0000-0000-000000000000")]
   fn test_テナントidが未指定ならtenant_missing(#[case] raw: &str) {
      let error = TenantId::parse(raw).unwrap_err();

      assert_eq!(error.code(), TENANT_MISSING);
      assert_eq!(error.category(), ErrorCategory::Validation);
   }

   #[rstest]
   #[case("tenant-1")]
   #[case("0190a8a0-7c4e-7a3b-9d8e")]
   fn test_テナントidが不正形式ならtenant_invalid(#[case] raw: &str) {
      let error = TenantId::parse(raw).unwrap_err();

      assert_eq!(error.code(), TENANT_INVALID);
      assert_eq!(error.category(), ErrorCategory::Validation);
   }

   // TenantName のテスト

   #[test]
   fn test_テナント名は前後の空白をトリミングする() {
      let name = TenantName::new("  Test Tenant  ").unwrap();
      assert_eq!(name.as_str(), "Test Tenant");
   }

   #[test]
   fn test_テナント名は空白のみの文字列を拒否する() {
      let error = TenantName::new("   ").unwrap_err();
      assert_eq!(error.code(), "TenantName.Invalid");
   }

   #[test]
   fn test_テナント名は255文字を超えると拒否する() {
      assert!(TenantName::new("a".repeat(256)).is_err());
      assert!(TenantName::new("a".repeat(255)).is_ok());
   }

   // TenantStatus のテスト

   #[rstest]
   #[case(TenantStatus::Active, "active")]
   #[case(TenantStatus::Suspended, "suspended")]
   fn test_テナント状態は文字列と相互変換できる(#[case] status: TenantStatus, #[case] raw: &str) {
      assert_eq!(status.to_string(), raw);
      assert_eq!(raw.parse::<TenantStatus>().unwrap(), status);
   }

   // Tenant のテスト

   fn tenant(status: TenantStatus) -> Tenant {
      Tenant::from_db(TenantId::new(), TenantName::new("Test Tenant").unwrap(), status)
   }

   #[test]
   fn test_利用中のテナントは操作を受け付ける() {
      assert!(tenant(TenantStatus::Active).ensure_active().is_ok());
   }

   #[test]
   fn test_利用停止中のテナントはforbidden() {
      let error = tenant(TenantStatus::Suspended).ensure_active().unwrap_err();

      assert_eq!(error.code(), TENANT_SUSPENDED);
      assert_eq!(error.category(), ErrorCategory::Forbidden);
   }

   #[test]
   fn test_状態変更で新しい状態になる() {
      let suspended = tenant(TenantStatus::Active)
         .with_status(TenantStatus::Suspended)
         .unwrap();

      assert_eq!(suspended.status(), TenantStatus::Suspended);
   }

   #[test]
   fn test_同じ状態への変更はconflict() {
      let error = tenant(TenantStatus::Active)
         .with_status(TenantStatus::Active)
         .unwrap_err();

      assert_eq!(error.category(), ErrorCategory::Conflict);
   }
}
