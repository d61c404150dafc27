//! # Canonical Log Line
//!
//! ディスパッチ完了時に、1 リクエストの要点を 1 行に集約したサマリログを出力する。
//!
//! `dispatch` スパンの内側で出力するため、スパンフィールド
//! （`request.name`, `request.kind`, `dispatch_id`, `tenant_id`）が JSON ログに含まれる。
//!
//! | 結果 | `dispatch.result` | レベル |
//! |------|-------------------|--------|
//! | 成功 | `success` | INFO（遅延時 WARN） |
//! | 想定内の失敗 | `failure` | INFO（遅延時 WARN） |
//! | `Unexpected` | `error` | ERROR |

use std::time::Duration;

use stocker_domain::DomainError;
use stocker_shared::event_log::dispatch::{LOG_TYPE, result};

/// ディスパッチ結果を分類する
pub(crate) fn classify(error: Option<&DomainError>) -> &'static str {
    match error {
        None => result::SUCCESS,
        Some(e) if e.is_unexpected() => result::ERROR,
        Some(_) => result::FAILURE,
    }
}

/// ミリ秒に変換する（`u64` に収まらない場合は `u64::MAX`）
pub(crate) fn as_millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Canonical Log Line を出力する
pub(crate) fn emit(latency: Duration, error: Option<&DomainError>, slow_threshold: Duration) {
    let latency_ms = as_millis_u64(latency);
    let outcome = classify(error);
    let code = error.map(DomainError::code);
    let category: Option<&'static str> = error.map(|e| e.category().into());

    if outcome == result::ERROR {
        tracing::error!(
            log.r#type = LOG_TYPE,
            dispatch.result = outcome,
            dispatch.latency_ms = latency_ms,
            error.code = code,
            error.category = category,
            "ディスパッチ失敗"
        );
    } else if latency > slow_threshold {
        tracing::warn!(
            log.r#type = LOG_TYPE,
            dispatch.result = outcome,
            dispatch.latency_ms = latency_ms,
            dispatch.slow_threshold_ms = as_millis_u64(slow_threshold),
            error.code = code,
            error.category = category,
            "ディスパッチ完了（遅延）"
        );
    } else {
        tracing::info!(
            log.r#type = LOG_TYPE,
            dispatch.result = outcome,
            dispatch.latency_ms = latency_ms,
            error.code = code,
            error.category = category,
            "ディスパッチ完了"
        );
    }
}
