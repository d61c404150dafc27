//! # Stocker インフラ層
//!
//! 永続化を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! リポジトリトレイトとその PostgreSQL 実装を提供する。
//! テナント分離は WHERE 句と RLS の二重で行う（[`db`] を参照）。
//!
//! ## 依存関係
//!
//! ```text
//! core-service → infra → domain → shared
//!                   ↘      ↓
//!                     shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - 接続プール、テナントスコープ付きコネクション、トランザクション
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - リポジトリトレイトと実装
//! - `mock` - インメモリモック（`test-utils` feature）

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
