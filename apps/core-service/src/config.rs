//! # Core Service 設定
//!
//! 環境変数から Core Service の設定を読み込む。
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `DATABASE_MAX_CONNECTIONS` | No | 接続プールの最大数（デフォルト: 10） |
//! | `DISPATCH_TIMEOUT_MS` | No | ハンドラのタイムアウト（未設定または 0 で無制限） |
//! | `DISPATCH_SLOW_THRESHOLD_MS` | No | 遅延とみなす閾値（デフォルト: 1000） |
//! | `LOG_FORMAT` | No | `json` または `pretty`（デフォルト: `pretty`） |
//!
//! 読み込みはルックアップ関数経由で行うため、テストでプロセスの環境変数に触れずに済む。

use std::{str::FromStr, time::Duration};

use stocker_shared::observability::LogFormat;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SLOW_THRESHOLD_MS: u64 = 1000;

/// 設定の読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// ディスパッチャの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// ハンドラのタイムアウト（`None` で無制限）
    pub handler_timeout: Option<Duration>,
    /// Canonical Log Line を WARN にする閾値
    pub slow_threshold:  Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout: None,
            slow_threshold:  Duration::from_millis(DEFAULT_SLOW_THRESHOLD_MS),
        }
    }
}

/// Core Service の設定
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// データベース接続 URL
    pub database_url:             String,
    /// 接続プールの最大数
    pub database_max_connections: u32,
    /// ディスパッチャの設定
    pub dispatch:                 DispatchConfig,
    /// ログ出力形式
    pub log_format:               LogFormat,
}

impl CoreConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意のルックアップ関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let database_max_connections =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name:  "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        let timeout_ms: u64 = parse_or(&lookup, "DISPATCH_TIMEOUT_MS", 0)?;
        let slow_threshold_ms = parse_or(
            &lookup,
            "DISPATCH_SLOW_THRESHOLD_MS",
            DEFAULT_SLOW_THRESHOLD_MS,
        )?;

        Ok(Self {
            database_url,
            database_max_connections,
            dispatch: DispatchConfig {
                handler_timeout: (timeout_ms > 0).then_some(Duration::from_millis(timeout_ms)),
                slow_threshold:  Duration::from_millis(slow_threshold_ms),
            },
            log_format: lookup("LOG_FORMAT")
                .map(|value| LogFormat::parse(&value))
                .unwrap_or_default(),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_必須項目だけでデフォルト値が使われる() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/stocker")]).unwrap();

        assert_eq!(config.database_url, "postgres://localhost/stocker");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.dispatch, DispatchConfig::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_database_urlが未設定ならエラー() {
        let result = load(&[]);

        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_ディスパッチ設定を読み込める() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/stocker"),
            ("DISPATCH_TIMEOUT_MS", "2500"),
            ("DISPATCH_SLOW_THRESHOLD_MS", "200"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(
            config.dispatch,
            DispatchConfig {
                handler_timeout: Some(Duration::from_millis(2500)),
                slow_threshold:  Duration::from_millis(200),
            }
        );
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_タイムアウト0は無制限() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/stocker"),
            ("DISPATCH_TIMEOUT_MS", "0"),
        ])
        .unwrap();

        assert_eq!(config.dispatch.handler_timeout, None);
    }

    #[test]
    fn test_数値でない値はinvalidエラー() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/stocker"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]);

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name:  "DATABASE_MAX_CONNECTIONS",
                value: "many".to_string(),
            }
        );
    }
}
