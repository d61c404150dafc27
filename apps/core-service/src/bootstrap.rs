//! # 起動処理
//!
//! 依存関係の組み立てとハンドラレジストリの構築を行う。
//!
//! ## 起動の流れ
//!
//! 1. `.env` と環境変数から [`CoreConfig`] を読み込む
//! 2. トレーシングを初期化する
//! 3. 接続プールとリポジトリを作成する
//! 4. すべてのリクエスト型が登録されていることを検証し、[`Dispatcher`] を返す
//!
//! 3 以降は [`build_dispatcher`] に分かれているため、テストではモックの
//! [`CoreDependencies`] を渡して同じ配線を検証できる。

use std::sync::Arc;

use stocker_domain::clock::{Clock, SystemClock};
use stocker_infra::{
    db::{self, PgTransactionManager, TransactionManager},
    repository::{
        BackupQuotaRepository,
        BackupRepository,
        PostgresBackupQuotaRepository,
        PostgresBackupRepository,
        PostgresSecuritySettingsRepository,
        PostgresTenantRepository,
        SecuritySettingsRepository,
        TenantRepository,
    },
};
use stocker_shared::observability::{TracingConfig, init_tracing};

use crate::{
    config::{CoreConfig, DispatchConfig},
    dispatch::{
        ActiveTenantBehavior,
        Dispatcher,
        Handler,
        HandlerRegistry,
        HandlerRegistryBuilder,
        RegistryError,
        Request,
    },
    usecase::{
        BackupUseCaseImpl,
        ChangeTenantStatusCommand,
        CreateBackupCommand,
        DeleteBackupCommand,
        GetBackupByIdQuery,
        GetBackupStatisticsQuery,
        GetBackupsQuery,
        GetSecuritySettingsQuery,
        GetTenantQuery,
        ListTenantsQuery,
        RecordBackupResultCommand,
        RestoreBackupCommand,
        SecuritySettingsUseCaseImpl,
        TenantUseCaseImpl,
        UpdatePasswordPolicyCommand,
        UpdateSessionPolicyCommand,
    },
};

/// ハンドラが依存するリポジトリ群
#[derive(Clone)]
pub struct CoreDependencies {
    pub tenants:    Arc<dyn TenantRepository>,
    pub backups:    Arc<dyn BackupRepository>,
    pub quotas:     Arc<dyn BackupQuotaRepository>,
    pub settings:   Arc<dyn SecuritySettingsRepository>,
    pub tx_manager: Arc<dyn TransactionManager>,
    pub clock:      Arc<dyn Clock>,
}

/// Core Service が処理するリクエスト名（昇順）
pub fn expected_request_names() -> Vec<&'static str> {
    let mut names = vec![
        GetBackupByIdQuery::NAME,
        GetBackupsQuery::NAME,
        GetBackupStatisticsQuery::NAME,
        CreateBackupCommand::NAME,
        RecordBackupResultCommand::NAME,
        DeleteBackupCommand::NAME,
        RestoreBackupCommand::NAME,
        GetSecuritySettingsQuery::NAME,
        UpdatePasswordPolicyCommand::NAME,
        UpdateSessionPolicyCommand::NAME,
        GetTenantQuery::NAME,
        ListTenantsQuery::NAME,
        ChangeTenantStatusCommand::NAME,
    ];
    names.sort_unstable();
    names
}

/// 共有ハンドラを登録し、同時に必須として宣言する
fn bind<R, H>(
    builder: HandlerRegistryBuilder,
    handler: &Arc<H>,
) -> Result<HandlerRegistryBuilder, RegistryError>
where
    R: Request,
    H: Handler<R>,
{
    let handler: Arc<dyn Handler<R>> = handler.clone();
    Ok(builder.register_shared::<R>(handler)?.require::<R>())
}

/// すべてのリクエスト型を登録したレジストリを構築する
pub fn build_registry(deps: &CoreDependencies) -> Result<HandlerRegistry, RegistryError> {
    let backup = Arc::new(BackupUseCaseImpl::new(
        deps.backups.clone(),
        deps.quotas.clone(),
        deps.tx_manager.clone(),
        deps.clock.clone(),
    ));
    let security = Arc::new(SecuritySettingsUseCaseImpl::new(
        deps.settings.clone(),
        deps.tx_manager.clone(),
        deps.clock.clone(),
    ));
    let tenant = Arc::new(TenantUseCaseImpl::new(
        deps.tenants.clone(),
        deps.tx_manager.clone(),
    ));

    let builder = HandlerRegistry::builder();

    let builder = bind::<GetBackupByIdQuery, _>(builder, &backup)?;
    let builder = bind::<GetBackupsQuery, _>(builder, &backup)?;
    let builder = bind::<GetBackupStatisticsQuery, _>(builder, &backup)?;
    let builder = bind::<CreateBackupCommand, _>(builder, &backup)?;
    let builder = bind::<RecordBackupResultCommand, _>(builder, &backup)?;
    let builder = bind::<DeleteBackupCommand, _>(builder, &backup)?;
    let builder = bind::<RestoreBackupCommand, _>(builder, &backup)?;

    let builder = bind::<GetSecuritySettingsQuery, _>(builder, &security)?;
    let builder = bind::<UpdatePasswordPolicyCommand, _>(builder, &security)?;
    let builder = bind::<UpdateSessionPolicyCommand, _>(builder, &security)?;

    let builder = bind::<GetTenantQuery, _>(builder, &tenant)?;
    let builder = bind::<ListTenantsQuery, _>(builder, &tenant)?;
    let builder = bind::<ChangeTenantStatusCommand, _>(builder, &tenant)?;

    builder.build()
}

/// 依存関係からディスパッチャを組み立てる
///
/// テナントスコープのリクエストには [`ActiveTenantBehavior`] が適用される。
pub fn build_dispatcher(
    deps: CoreDependencies,
    config: DispatchConfig,
) -> Result<Dispatcher, RegistryError> {
    let registry = build_registry(&deps)?;
    tracing::info!(handlers = registry.len(), "ハンドラレジストリを構築しました");

    Ok(Dispatcher::new(Arc::new(registry))
        .with_config(config)
        .with_behavior(Arc::new(ActiveTenantBehavior::new(deps.tenants))))
}

/// Core Service を起動し、ディスパッチャを返す
///
/// 設定の不備、DB 接続の失敗、ハンドラの登録漏れはいずれもここでエラーになる。
pub async fn start(service_name: &str) -> anyhow::Result<Dispatcher> {
    dotenvy::dotenv().ok();

    let config = CoreConfig::from_env()?;
    init_tracing(&TracingConfig::new(service_name, config.log_format));

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "データベースに接続しました"
    );

    let deps = CoreDependencies {
        tenants:    Arc::new(PostgresTenantRepository::new(pool.clone())),
        backups:    Arc::new(PostgresBackupRepository::new(pool.clone())),
        quotas:     Arc::new(PostgresBackupQuotaRepository::new(pool.clone())),
        settings:   Arc::new(PostgresSecuritySettingsRepository::new(pool.clone())),
        tx_manager: Arc::new(PgTransactionManager::new(pool)),
        clock:      Arc::new(SystemClock),
    };

    let dispatcher = build_dispatcher(deps, config.dispatch)?;
    tracing::info!(service = service_name, "Core Service を起動しました");
    Ok(dispatcher)
}
