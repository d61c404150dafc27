//! # ディスパッチャ
//!
//! エンベロープを受け取り、テナントコンテキストの解決、ハンドラの解決、
//! ビヘイビアの実行、ハンドラの呼び出しを行って `Result` を返す。
//!
//! ## 処理の流れ
//!
//! ```text
//! Received → TenantChecked → HandlerResolved → Executing → Completed
//! ```
//!
//! - テナントクレームの検証に失敗したらハンドラを呼ばずに `Err` を返す
//! - ハンドラ未登録は設定の不備なので panic する（起動時検証で防ぐ）
//! - ハンドラ内の想定外の失敗（インフラ障害、panic、タイムアウト、キャンセル）は
//!   ここで一度だけ捕捉し、ログに出して `Unexpected` に変換する
//!
//! ## キャンセル
//!
//! 呼び出し元のトークンが発火するとハンドラの future をドロップする。
//! ハンドラには子トークンを渡すため、タイムアウト時は子トークンだけを発火する。

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use futures::FutureExt;
use stocker_domain::DomainResult;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    behavior::{DispatchMeta, PipelineBehavior},
    canonical_log,
    handler::HandlerContext,
    registry::HandlerRegistry,
    request::{Envelope, Request, RequestScope},
};
use crate::{config::DispatchConfig, error::CoreError};

/// ディスパッチャ
///
/// 共有状態は読み取り専用のレジストリとビヘイビアのみ。
/// `Clone` は安価（内部は `Arc`）。
#[derive(Clone)]
pub struct Dispatcher {
    registry:  Arc<HandlerRegistry>,
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
    config:    DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            behaviors: Vec::new(),
            config: DispatchConfig::default(),
        }
    }

    /// ビヘイビアを追加する（登録順に実行される）
    pub fn with_behavior(mut self, behavior: Arc<dyn PipelineBehavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// リクエストをディスパッチする
    ///
    /// # Panics
    ///
    /// `R` のハンドラが登録されていない場合。
    pub async fn dispatch<R: Request>(
        &self,
        envelope: Envelope<R>,
        cancel: CancellationToken,
    ) -> DomainResult<R::Output> {
        let dispatch_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "dispatch",
            request.name = R::NAME,
            request.kind = %R::KIND,
            %dispatch_id,
            tenant_id = tracing::field::Empty,
        );

        self.run(envelope, cancel, dispatch_id)
            .instrument(span)
            .await
    }

    async fn run<R: Request>(
        &self,
        envelope: Envelope<R>,
        cancel: CancellationToken,
        dispatch_id: Uuid,
    ) -> DomainResult<R::Output> {
        let started = Instant::now();
        let (claim, request) = envelope.into_parts();

        // Received → TenantChecked
        let scope = match <R::Scope as RequestScope>::resolve(claim) {
            Ok(scope) => scope,
            Err(error) => {
                canonical_log::emit(started.elapsed(), Some(&error), self.config.slow_threshold);
                return Err(error);
            }
        };
        let tenant_id = <R::Scope as RequestScope>::tenant_id(&scope).cloned();
        if let Some(tenant_id) = &tenant_id {
            tracing::Span::current().record("tenant_id", tracing::field::display(tenant_id));
        }

        // TenantChecked → HandlerResolved
        let handler = self.registry.resolve::<R>().unwrap_or_else(|| {
            panic!(
                "BUG: {} のハンドラが登録されていません。起動時に HandlerRegistryBuilder::require で検証してください",
                R::NAME
            )
        });

        let meta = DispatchMeta {
            dispatch_id,
            request_name: R::NAME,
            kind: R::KIND,
            tenant_id,
        };
        let handler_token = cancel.child_token();
        let ctx = HandlerContext::new(scope, handler_token.clone(), dispatch_id);

        // HandlerResolved → Executing
        let execution = async {
            for behavior in &self.behaviors {
                if let Err(error) = behavior.before_handle(&meta).await {
                    tracing::debug!(behavior = behavior.name(), "ビヘイビアが処理を中断");
                    return Err(error);
                }
            }
            handler.handle(request, &ctx).await
        };
        let guarded = AssertUnwindSafe(execution).catch_unwind();
        let limit = self.config.handler_timeout;

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Cancelled),
            joined = async {
                match limit {
                    Some(limit) => tokio::time::timeout(limit, guarded)
                        .await
                        .unwrap_or(Ok(Err(CoreError::TimedOut(limit)))),
                    None => guarded.await,
                }
            } => joined.unwrap_or_else(|payload| Err(CoreError::Panicked(panic_message(payload.as_ref())))),
        };
        if matches!(outcome, Err(CoreError::TimedOut(_))) {
            handler_token.cancel();
        }

        // Executing → Completed
        let result = outcome.map_err(CoreError::into_domain_error);
        for behavior in &self.behaviors {
            behavior.after_handle(&meta, result.as_ref().err()).await;
        }
        canonical_log::emit(
            started.elapsed(),
            result.as_ref().err(),
            self.config.slow_threshold,
        );
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "不明な panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_panicメッセージを文字列として取り出す() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new("kaboom".to_string());
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "kaboom");
        assert_eq!(panic_message(other.as_ref()), "不明な panic");
    }
}
