//! # Stocker 共有ユーティリティ
//!
//! このクレートは、Stocker の全モジュール（CRM / HR / Finance / Inventory /
//! Manufacturing）で使用される共通ユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - 他のすべてのクレート（domain, infra, core-service）から依存される
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - 外部クレートへの依存は最小限に抑える

pub mod error_response;
pub mod event_log;
pub mod observability;
pub mod paged_result;

pub use error_response::ErrorResponse;
pub use paged_result::{PageRequest, PagedResult, PaginationError};
