//! # Core Service
//!
//! 業務モジュールが共通で使うテナントスコープ付きのコマンド / クエリディスパッチと、
//! その上に載るユースケースを提供する。
//!
//! ## 役割
//!
//! - **ディスパッチ**: テナントクレームの検証、ハンドラの解決、横断処理、エラーの正規化
//! - **ユースケース**: バックアップ、セキュリティ設定、テナント管理
//! - **起動**: 設定の読み込みと依存関係の組み立て
//!
//! HTTP などの外側の境界はこのクレートの利用側が持つ。
//! 境界ではエラーを [`error::to_error_response`] で問題詳細に変換する。

pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod usecase;
