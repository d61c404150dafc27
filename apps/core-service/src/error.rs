//! # Core Service エラー定義
//!
//! ハンドラのエラー型 [`CoreError`] と、境界でのステータス・問題詳細への変換を定義する。
//!
//! ## 設計方針
//!
//! - ハンドラは `CoreError` を返す。想定内の失敗は `CoreError::Domain`
//! - インフラ障害をハンドラで特定カテゴリに付け替えない。
//!   例外は楽観的ロックの競合で、`From<InfraError>` が `Conflict` に変換する
//! - `DomainError` への変換（[`CoreError::into_domain_error`]）はディスパッチャだけが行う。
//!   想定外の失敗はここで一度だけログに出す
//! - カテゴリ → ステータスの対応は網羅的な `match` で書く

use std::time::Duration;

use stocker_domain::{DomainError, ErrorCategory};
use stocker_infra::{InfraError, InfraErrorKind};
use stocker_shared::{
    ErrorResponse,
    error_response::INTERNAL_ERROR_DETAIL,
    event_log::error::{category, kind},
};
use thiserror::Error;

use crate::dispatch::canonical_log;

/// 想定外の失敗の既定コード
pub const INTERNAL_UNEXPECTED: &str = "Internal.Unexpected";
/// ハンドラのタイムアウト
pub const DISPATCH_TIMEOUT: &str = "Dispatch.Timeout";
/// 呼び出し元によるキャンセル
pub const DISPATCH_CANCELLED: &str = "Dispatch.Cancelled";

/// ハンドラで発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// 想定内の失敗（そのまま呼び出し元に返る）
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// インフラ障害
    #[error("インフラエラー: {0}")]
    Infra(InfraError),

    /// 呼び出し元によるキャンセル
    #[error("キャンセルされました")]
    Cancelled,

    /// ハンドラのタイムアウト
    #[error("{0:?} 以内に完了しませんでした")]
    TimedOut(Duration),

    /// ハンドラの panic
    #[error("ハンドラが panic しました: {0}")]
    Panicked(String),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<InfraError> for CoreError {
    fn from(error: InfraError) -> Self {
        match error.kind() {
            InfraErrorKind::Conflict { entity, id } => CoreError::Domain(DomainError::conflict(
                format!("{entity}.Conflict"),
                format!("{entity}({id}) は他の操作によって更新されています"),
            )),
            _ => CoreError::Infra(error),
        }
    }
}

impl CoreError {
    /// 呼び出し元に返す `DomainError` に変換する
    ///
    /// 想定外の失敗はここでコンテキスト付きでログに出し、
    /// 内部メッセージを含まない `Unexpected` に置き換える。
    pub fn into_domain_error(self) -> DomainError {
        match self {
            CoreError::Domain(error) => error,
            CoreError::Infra(error) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = error.kind_name(),
                    span_trace = %error.span_trace(),
                    "インフラエラー: {}",
                    error
                );
                DomainError::unexpected(INTERNAL_UNEXPECTED, INTERNAL_ERROR_DETAIL)
            }
            CoreError::Panicked(message) => {
                tracing::error!(
                    error.category = category::HANDLER,
                    error.kind = kind::PANIC,
                    "ハンドラが panic しました: {}",
                    message
                );
                DomainError::unexpected(INTERNAL_UNEXPECTED, INTERNAL_ERROR_DETAIL)
            }
            CoreError::Internal(message) => {
                tracing::error!(
                    error.category = category::HANDLER,
                    error.kind = kind::INTERNAL,
                    "内部エラー: {}",
                    message
                );
                DomainError::unexpected(INTERNAL_UNEXPECTED, INTERNAL_ERROR_DETAIL)
            }
            CoreError::TimedOut(limit) => {
                tracing::error!(
                    error.category = category::HANDLER,
                    error.kind = kind::TIMEOUT,
                    timeout_ms = canonical_log::as_millis_u64(limit),
                    "ハンドラがタイムアウトしました"
                );
                DomainError::unexpected(DISPATCH_TIMEOUT, "処理がタイムアウトしました")
            }
            CoreError::Cancelled => {
                tracing::warn!(
                    error.category = category::HANDLER,
                    error.kind = kind::CANCELLED,
                    "ディスパッチがキャンセルされました"
                );
                DomainError::unexpected(DISPATCH_CANCELLED, "処理がキャンセルされました")
            }
        }
    }
}

/// エラーカテゴリを HTTP ステータスコードに変換する
pub fn http_status(category: ErrorCategory) -> u16 {
    match category {
        ErrorCategory::NotFound => 404,
        ErrorCategory::Validation => 400,
        ErrorCategory::Conflict => 409,
        ErrorCategory::Unauthorized => 401,
        ErrorCategory::Forbidden => 403,
        ErrorCategory::Unexpected => 500,
    }
}

/// `DomainError` を問題詳細レスポンスに変換する
///
/// `Unexpected` は内部メッセージを出さず、固定の詳細文だけを返す。
pub fn to_error_response(error: &DomainError) -> ErrorResponse {
    let response = match error.category() {
        ErrorCategory::NotFound => ErrorResponse::not_found(error.message()),
        ErrorCategory::Validation => ErrorResponse::validation_error(error.message()),
        ErrorCategory::Conflict => ErrorResponse::conflict(error.message()),
        ErrorCategory::Unauthorized => ErrorResponse::unauthorized(error.message()),
        ErrorCategory::Forbidden => ErrorResponse::forbidden(error.message()),
        ErrorCategory::Unexpected => ErrorResponse::internal_error(),
    };
    response.with_code(error.code())
}
