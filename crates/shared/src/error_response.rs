//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! 境界（API 層）で返す共通のエラーレスポンス構造体を提供する。
//!
//! ## 設計
//!
//! - `ErrorResponse` は純粋なデータ構造（`Serialize` / `Deserialize` のみ）
//! - ドメインエラーからの変換は core-service の責務（shared はドメインに依存しない）
//! - 安定したエラーコード（例: `"Backup.NotFound"`）は拡張メンバー `code` に載せる
//! - 500 系は detail を固定値にし、内部情報を外に出さない

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://stocker.example.com/errors";

/// 500 応答の固定 detail
pub const INTERNAL_ERROR_DETAIL: &str = "内部エラーが発生しました";

/// エラーレスポンス（RFC 9457 Problem Details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
   #[serde(rename = "type")]
   pub error_type: String,
   pub title:      String,
   pub status:     u16,
   pub detail:     String,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub code:       Option<String>,
}

impl ErrorResponse {
   /// 汎用コンストラクタ
   ///
   /// `error_type_suffix` はベース URI に付加される（例: `"quota-exceeded"`）。
   pub fn new(
      error_type_suffix: &str,
      title: impl Into<String>,
      status: u16,
      detail: impl Into<String>,
   ) -> Self {
      Self {
         error_type: format!("{ERROR_TYPE_BASE}/{error_type_suffix}"),
         title: title.into(),
         status,
         detail: detail.into(),
         code: None,
      }
   }

   /// 安定したエラーコードを付与する
   pub fn with_code(mut self, code: impl Into<String>) -> Self {
      self.code = Some(code.into());
      self
   }

   /// 400 Validation Error
   pub fn validation_error(detail: impl Into<String>) -> Self {
      Self::new("validation-error", "Validation Error", 400, detail)
   }

   /// 401 Unauthorized
   pub fn unauthorized(detail: impl Into<String>) -> Self {
      Self::new("unauthorized", "Unauthorized", 401, detail)
   }

   /// 403 Forbidden
   pub fn forbidden(detail: impl Into<String>) -> Self {
      Self::new("forbidden", "Forbidden", 403, detail)
   }

   /// 404 Not Found
   pub fn not_found(detail: impl Into<String>) -> Self {
      Self::new("not-found", "Not Found", 404, detail)
   }

   /// 409 Conflict
   pub fn conflict(detail: impl Into<String>) -> Self {
      Self::new("conflict", "Conflict", 409, detail)
   }

   /// 500 Internal Server Error
   ///
   /// detail は固定値。
   pub fn internal_error() -> Self {
      Self::new(
         "internal-error",
         "Internal Server Error",
         500,
         INTERNAL_ERROR_DETAIL,
      )
   }
}
