//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で効率的に調査できるよう、ログフィールドの命名規約と
//! ヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## ディスパッチログ
//!
//! ディスパッチャは 1 リクエストにつき 1 行のカノニカルログを出力する。
//! フィールド名は [`dispatch`] モジュールの定数に揃える。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` に `error.category` + `error.kind` フィールドを直接追加する。
//! 定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.tenant_id`: テナント ID（プラットフォーム操作では省略）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const BACKUP: &str = "backup";
        pub const SECURITY_SETTINGS: &str = "security_settings";
        pub const TENANT: &str = "tenant";
    }

    /// イベントアクション
    pub mod action {
        // バックアップ
        pub const BACKUP_REQUESTED: &str = "backup.requested";
        pub const BACKUP_COMPLETED: &str = "backup.completed";
        pub const BACKUP_FAILED: &str = "backup.failed";
        pub const BACKUP_DELETED: &str = "backup.deleted";
        pub const BACKUP_RESTORED: &str = "backup.restored";

        // セキュリティ設定
        pub const PASSWORD_POLICY_UPDATED: &str = "security.password_policy_updated";
        pub const SESSION_POLICY_UPDATED: &str = "security.session_policy_updated";

        // テナント管理
        pub const TENANT_STATUS_CHANGED: &str = "tenant.status_changed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const BACKUP: &str = "backup";
        pub const SECURITY_SETTINGS: &str = "security_settings";
        pub const TENANT: &str = "tenant";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// ディスパッチ（カノニカルログ）フィールドの定数
pub mod dispatch {
    /// `log.type` の値
    pub const LOG_TYPE: &str = "canonical";

    /// `dispatch.result` の値
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
        pub const ERROR: &str = "error";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// ハンドラ内部（panic、タイムアウト、キャンセル、内部エラー）
        pub const HANDLER: &str = "handler";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const INTERNAL: &str = "internal";
        pub const PANIC: &str = "panic";
        pub const TIMEOUT: &str = "timeout";
        pub const CANCELLED: &str = "cancelled";
    }
}
