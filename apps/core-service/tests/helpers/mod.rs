//! 統合テスト共通のヘルパー
//!
//! - [`TestDeps`]: モックリポジトリ一式と、それを配線したディスパッチャ
//! - テスト専用のリクエスト型とハンドラ（呼び出し回数の記録、panic、待機）
//! - ログをキャプチャする `tracing_subscriber::Layer`

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use stocker_core_service::{
    bootstrap::{CoreDependencies, build_dispatcher},
    config::DispatchConfig,
    dispatch::{
        ActiveTenantBehavior,
        Dispatcher,
        Handler,
        HandlerContext,
        HandlerRegistry,
        PlatformContext,
        PlatformScoped,
        Request,
        RequestKind,
        TenantContext,
        TenantScoped,
    },
    error::CoreError,
};
use stocker_domain::{
    clock::FixedClock,
    tenant::{Tenant, TenantId, TenantName, TenantStatus},
};
use stocker_infra::mock::{
    MockBackupQuotaRepository,
    MockBackupRepository,
    MockSecuritySettingsRepository,
    MockTenantRepository,
    MockTransactionManager,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 20, 10, 30, 0).unwrap()
}

// =============================================================================
// 依存関係
// =============================================================================

/// モックリポジトリ一式
#[derive(Clone, Default)]
pub struct TestDeps {
    pub tenants:    MockTenantRepository,
    pub backups:    MockBackupRepository,
    pub quotas:     MockBackupQuotaRepository,
    pub settings:   MockSecuritySettingsRepository,
    pub tx_manager: MockTransactionManager,
}

impl TestDeps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core_dependencies(&self) -> CoreDependencies {
        CoreDependencies {
            tenants:    Arc::new(self.tenants.clone()),
            backups:    Arc::new(self.backups.clone()),
            quotas:     Arc::new(self.quotas.clone()),
            settings:   Arc::new(self.settings.clone()),
            tx_manager: Arc::new(self.tx_manager.clone()),
            clock:      Arc::new(FixedClock::new(now())),
        }
    }

    /// 本番と同じ配線のディスパッチャ
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher_with(DispatchConfig::default())
    }

    pub fn dispatcher_with(&self, config: DispatchConfig) -> Dispatcher {
        build_dispatcher(self.core_dependencies(), config).unwrap()
    }

    /// テスト専用ハンドラだけを登録したディスパッチャ
    pub fn dispatcher_for(&self, registry: HandlerRegistry, config: DispatchConfig) -> Dispatcher {
        Dispatcher::new(Arc::new(registry))
            .with_config(config)
            .with_behavior(Arc::new(ActiveTenantBehavior::new(Arc::new(
                self.tenants.clone(),
            ))))
    }

    pub fn add_tenant(&self, name: &str, status: TenantStatus) -> TenantId {
        let tenant = Tenant::from_db(TenantId::new(), TenantName::new(name).unwrap(), status);
        let id = tenant.id().clone();
        self.tenants.add_tenant(tenant);
        id
    }

    pub fn add_active_tenant(&self) -> TenantId {
        self.add_tenant("Acme", TenantStatus::Active)
    }
}

// =============================================================================
// テスト専用リクエスト
// =============================================================================

/// 値をそのまま返すテナントスコープのクエリ
#[derive(Debug, Clone, Copy)]
pub struct Echo {
    pub value: u32,
}

impl Request for Echo {
    type Output = u32;
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "Echo";
}

/// 呼び出し回数と受け取ったテナントを記録するハンドラ
#[derive(Clone, Default)]
pub struct SpyHandler {
    calls:   Arc<AtomicUsize>,
    tenants: Arc<Mutex<Vec<TenantId>>>,
}

impl SpyHandler {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_tenants(&self) -> Vec<TenantId> {
        self.tenants.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler<Echo> for SpyHandler {
    async fn handle(
        &self,
        request: Echo,
        ctx: &HandlerContext<TenantContext>,
    ) -> Result<u32, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tenants.lock().unwrap().push(ctx.tenant_id().clone());
        Ok(request.value)
    }
}

/// 必ず panic するテナントスコープのコマンド
#[derive(Debug, Clone, Copy)]
pub struct Explode;

impl Request for Explode {
    type Output = ();
    type Scope = TenantScoped;

    const KIND: RequestKind = RequestKind::Command;
    const NAME: &'static str = "Explode";
}

pub struct PanickingHandler;

#[async_trait]
impl Handler<Explode> for PanickingHandler {
    async fn handle(
        &self,
        _request: Explode,
        _ctx: &HandlerContext<TenantContext>,
    ) -> Result<(), CoreError> {
        panic!("boom: secret connection string");
    }
}

/// 指定時間待つプラットフォームスコープのクエリ
#[derive(Debug, Clone, Copy)]
pub struct Sleep {
    pub duration: Duration,
}

impl Request for Sleep {
    type Output = ();
    type Scope = PlatformScoped;

    const KIND: RequestKind = RequestKind::Query;
    const NAME: &'static str = "Sleep";
}

/// 受け取ったキャンセルトークンを保持するハンドラ
#[derive(Clone, Default)]
pub struct SleepHandler {
    token: Arc<Mutex<Option<CancellationToken>>>,
}

impl SleepHandler {
    /// ハンドラに渡されたトークン（未呼び出しなら `None`）
    pub fn received_token(&self) -> Option<CancellationToken> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler<Sleep> for SleepHandler {
    async fn handle(
        &self,
        request: Sleep,
        ctx: &HandlerContext<PlatformContext>,
    ) -> Result<(), CoreError> {
        *self.token.lock().unwrap() = Some(ctx.cancellation().clone());
        tokio::time::sleep(request.duration).await;
        ctx.ensure_active()
    }
}

// =============================================================================
// ログキャプチャ
// =============================================================================

struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level:   tracing::Level,
    pub message: String,
    pub fields:  Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_canonical(&self) -> bool {
        self.field("log.type") == Some("canonical")
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.events.lock().unwrap().push(CapturedEvent {
            level:   *event.metadata().level(),
            message: visitor.message.unwrap_or_default(),
            fields:  visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields:  Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

pub type CapturedEvents = Arc<Mutex<Vec<CapturedEvent>>>;

/// テスト用にキャプチャ subscriber をセットアップする
///
/// 返り値の `DefaultGuard` はスコープに保持すること（ドロップでリセット）。
pub fn setup_capture() -> (tracing::subscriber::DefaultGuard, CapturedEvents) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let capture = CaptureLayer {
        events: events.clone(),
    };
    let subscriber = tracing_subscriber::registry().with(capture);
    let guard = tracing::subscriber::set_default(subscriber);
    (guard, events)
}

/// キャプチャしたイベントのうち Canonical Log Line だけを返す
pub fn canonical_lines(events: &CapturedEvents) -> Vec<CapturedEvent> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.is_canonical())
        .cloned()
        .collect()
}
