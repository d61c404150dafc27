//! # ドメイン層エラー定義
//!
//! ハンドラが返す「想定内の失敗」を表現するエラー型。
//!
//! ## 設計方針
//!
//! - **構造化**: 安定したコード（`"Backup.NotFound"`）、人間向けメッセージ、
//!   カテゴリの 3 つ組で表す
//! - **閉じた分類**: [`ErrorCategory`] は列挙型で網羅的に分類し、境界での変換は
//!   すべて `match` で書く。カテゴリを追加するとマッピング漏れがコンパイルエラーになる
//! - **例外を使わない**: 想定内の失敗は `Err(DomainError)` として返し、panic しない
//! - **失敗した結果の値取得は即座に失敗する**: [`DomainResult`] は `Result` の別名なので、
//!   `Err` に対する `unwrap()` は既定値を返さず panic する
//!
//! ## カテゴリと HTTP ステータスの対応
//!
//! | カテゴリ | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `NotFound` | 404 Not Found | エンティティが存在しない |
//! | `Validation` | 400 Bad Request | 入力値の検証失敗 |
//! | `Conflict` | 409 Conflict | 状態の競合、楽観的ロックの失敗 |
//! | `Unauthorized` | 401 Unauthorized | 認証されていない |
//! | `Forbidden` | 403 Forbidden | 権限不足、利用停止中 |
//! | `Unexpected` | 500 Internal Server Error | 想定外の障害 |
//!
//! ## 使用例
//!
//! ```rust
//! use stocker_domain::{DomainError, DomainResult, ErrorCategory};
//!
//! fn find_backup(found: bool) -> DomainResult<&'static str> {
//!     if !found {
//!         return Err(DomainError::not_found(
//!             "Backup.NotFound",
//!             "バックアップが見つかりません",
//!         ));
//!     }
//!     Ok("backup")
//! }
//!
//! let error = find_backup(false).unwrap_err();
//! assert_eq!(error.code(), "Backup.NotFound");
//! assert_eq!(error.category(), ErrorCategory::NotFound);
//! ```

use std::borrow::Cow;

use serde::Serialize;
use strum::IntoStaticStr;
use thiserror::Error;

/// ドメイン操作の結果
pub type DomainResult<T> = Result<T, DomainError>;

/// エラーカテゴリ
///
/// 境界（API 層）でステータスコードに変換するための分類。
/// 網羅的に `match` すること（ワイルドカード禁止）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoStaticStr, strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// 対象が存在しない
    NotFound,
    /// 入力値がビジネスルールに違反している
    Validation,
    /// 現在の状態と競合する
    Conflict,
    /// 認証されていない
    Unauthorized,
    /// 認証済みだが許可されていない
    Forbidden,
    /// 想定外の障害（インフラ障害、panic、タイムアウトなど）
    Unexpected,
}

/// ドメイン層で発生するエラー
///
/// # フィールド
///
/// - `code`: 機械可読な安定コード（`"<Entity>.<Reason>"` 形式）
/// - `message`: 人間向けメッセージ
/// - `category`: [`ErrorCategory`]
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("[{code}] {message}")]
pub struct DomainError {
    code:     Cow<'static, str>,
    message:  String,
    category: ErrorCategory,
}

impl DomainError {
    /// 任意のカテゴリでエラーを作成する
    pub fn new(
        category: ErrorCategory,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            category,
        }
    }

    /// 対象が存在しない（404）
    pub fn not_found(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, code, message)
    }

    /// 入力値の検証失敗（400）
    pub fn validation(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    /// 状態の競合（409）
    pub fn conflict(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, code, message)
    }

    /// 認証されていない（401）
    pub fn unauthorized(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unauthorized, code, message)
    }

    /// 権限不足（403）
    pub fn forbidden(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Forbidden, code, message)
    }

    /// 想定外の障害（500）
    ///
    /// ハンドラは直接使わない。ディスパッチャが想定外の失敗を変換する際に使う。
    pub fn unexpected(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unexpected, code, message)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 想定外の障害かどうか
    pub fn is_unexpected(&self) -> bool {
        self.category == ErrorCategory::Unexpected
    }
}

impl From<stocker_shared::PaginationError> for DomainError {
    fn from(err: stocker_shared::PaginationError) -> Self {
        use stocker_shared::PaginationError;

        let code = match err {
            PaginationError::InvalidPageNumber(_) => "Pagination.InvalidPageNumber",
            PaginationError::InvalidPageSize(_) => "Pagination.InvalidPageSize",
            PaginationError::TooManyItems { .. } => "Pagination.TooManyItems",
        };
        Self::validation(code, err.to_string())
    }
}
