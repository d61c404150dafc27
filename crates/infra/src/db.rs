//! # PostgreSQL データベース接続管理
//!
//! 接続プール、テナントスコープ付きコネクション、トランザクションを提供する。
//!
//! ## テナント分離
//!
//! テナントのデータはすべて `tenant_id` カラムを持ち、次の二重防御で分離する:
//!
//! 1. リポジトリの WHERE 句で明示的に `tenant_id` を指定する
//! 2. PostgreSQL の RLS ポリシーが `app.tenant_id` セッション変数を参照する
//!
//! 読み取りは [`TenantConnection`]、書き込みは [`TxContext`] が
//! `app.tenant_id` を設定する。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use stocker_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/stocker", 10).await?;
//! let tx_manager = db::PgTransactionManager::new(pool.clone());
//! ```

use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use async_trait::async_trait;
use sqlx::{
    PgConnection,
    PgPool,
    Postgres,
    Transaction,
    pool::PoolConnection,
    postgres::PgPoolOptions,
};
use stocker_domain::tenant::TenantId;

use crate::error::InfraError;

/// RLS 用の `after_release` フックを含む `PgPoolOptions` を返す
///
/// コネクションがプールに返却される際、`app.tenant_id` セッション変数を
/// 空文字列にリセットする。別テナントのリクエストに前のテナントの ID が
/// 残らない。
pub fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new().after_release(|conn, _meta| {
        Box::pin(async move {
            sqlx::query("SELECT set_config('app.tenant_id', '', false)")
                .execute(&mut *conn)
                .await?;
            Ok(true)
        })
    })
}

/// PostgreSQL 接続プールを作成する
///
/// 起動時に一度だけ呼び出し、作成したプールをリポジトリ間で共有する。
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    pool_options()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

// =============================================================================
// TenantConnection
// =============================================================================

/// テナントスコープ付き DB コネクション
///
/// コネクション取得時に `app.tenant_id` を設定する。
/// ドロップ時（プールへの返却時）に [`pool_options`] のフックがリセットする。
pub struct TenantConnection {
    conn:      PoolConnection<Postgres>,
    tenant_id: TenantId,
}

impl TenantConnection {
    pub async fn acquire(pool: &PgPool, tenant_id: &TenantId) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, false)")
            .bind(tenant_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(Self {
            conn,
            tenant_id: tenant_id.clone(),
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

impl Deref for TenantConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for TenantConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

// =============================================================================
// TxContext
// =============================================================================

/// トランザクションコンテキスト
///
/// 書き込みリポジトリメソッドの必須引数。
/// トランザクションなしの書き込みはコンパイルエラーになる。
///
/// # ライフサイクル
///
/// 1. `TransactionManager::begin()` で作成
/// 2. 書き込みメソッドに `&mut TxContext` として渡す
/// 3. `commit()` でコミット、またはドロップでロールバック
///
/// 複数の書き込みを同じ `TxContext` に載せると、すべて反映されるか
/// 何も反映されないかのどちらかになる。
pub struct TxContext(TxContextInner);

enum TxContextInner {
    Pg(Transaction<'static, Postgres>),
    #[cfg(any(test, feature = "test-utils"))]
    Mock(MockTx),
}

/// インメモリのトランザクション
///
/// 書き込みは `stage` で積まれ、`commit` 時にまとめて適用される。
/// ドロップされた場合は何も適用されない。
///
/// `check_on_commit` で積んだ検査はコミット時に書き込みより先に評価され、
/// 1 つでも失敗すると何も適用されない。検査と適用は `MOCK_COMMIT_LOCK` の下で
/// 行うため、並行するコミットの間でバージョン検査が追い越されることはない。
#[cfg(any(test, feature = "test-utils"))]
struct MockTx {
    checks:         Vec<MockCheck>,
    staged:         Vec<Box<dyn FnOnce() + Send>>,
    fail_on_commit: bool,
}

#[cfg(any(test, feature = "test-utils"))]
type MockCheck = Box<dyn FnOnce() -> Result<(), InfraError> + Send>;

#[cfg(any(test, feature = "test-utils"))]
static MOCK_COMMIT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

impl TxContext {
    /// テナントスコープ付きの Postgres トランザクションを開始する
    ///
    /// `set_config(..., true)` でトランザクションローカルに `app.tenant_id` を設定する。
    pub(crate) async fn begin_pg(pool: &PgPool, tenant_id: &TenantId) -> Result<Self, InfraError> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
            .bind(tenant_id.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(Self(TxContextInner::Pg(tx)))
    }

    /// テスト用のモック TxContext を作成する
    #[cfg(any(test, feature = "test-utils"))]
    pub fn mock() -> Self {
        Self(TxContextInner::Mock(MockTx {
            checks:         Vec::new(),
            staged:         Vec::new(),
            fail_on_commit: false,
        }))
    }

    /// コミットに失敗するモック TxContext を作成する
    #[cfg(any(test, feature = "test-utils"))]
    pub fn mock_failing_commit() -> Self {
        Self(TxContextInner::Mock(MockTx {
            checks:         Vec::new(),
            staged:         Vec::new(),
            fail_on_commit: true,
        }))
    }

    /// モックリポジトリの書き込みを積む（コミット時に適用される）
    #[cfg(any(test, feature = "test-utils"))]
    pub fn stage(&mut self, write: impl FnOnce() + Send + 'static) {
        match &mut self.0 {
            TxContextInner::Mock(tx) => tx.staged.push(Box::new(write)),
            TxContextInner::Pg(_) => {
                panic!("BUG: stage() called on Pg TxContext. Only mock repos may stage writes.")
            }
        }
    }

    /// コミット時に評価する検査を積む（モックリポジトリのバージョン検査用）
    #[cfg(any(test, feature = "test-utils"))]
    pub fn check_on_commit(
        &mut self,
        check: impl FnOnce() -> Result<(), InfraError> + Send + 'static,
    ) {
        match &mut self.0 {
            TxContextInner::Mock(tx) => tx.checks.push(Box::new(check)),
            TxContextInner::Pg(_) => {
                panic!("BUG: check_on_commit() called on Pg TxContext. Only mock repos may stage checks.")
            }
        }
    }

    /// トランザクションをコミットする
    ///
    /// 呼ばずにドロップすると、ロールバックされる。
    pub async fn commit(self) -> Result<(), InfraError> {
        match self.0 {
            TxContextInner::Pg(tx) => {
                tx.commit().await?;
                Ok(())
            }
            #[cfg(any(test, feature = "test-utils"))]
            TxContextInner::Mock(tx) => {
                if tx.fail_on_commit {
                    return Err(InfraError::unexpected("mock commit failure"));
                }
                let _guard = MOCK_COMMIT_LOCK
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                for check in tx.checks {
                    check()?;
                }
                tx.staged.into_iter().for_each(|write| write());
                Ok(())
            }
        }
    }

    /// トランザクション内の DB コネクションを取得する
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        match &mut self.0 {
            TxContextInner::Pg(tx) => tx,
            #[cfg(any(test, feature = "test-utils"))]
            TxContextInner::Mock(_) => {
                panic!("BUG: conn() called on Mock TxContext. Mock repos should not call conn().")
            }
        }
    }
}

// =============================================================================
// TransactionManager
// =============================================================================

/// トランザクション管理 trait
///
/// ハンドラは PgPool に直接依存せず、この trait 経由でトランザクションを開始する。
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// テナントスコープ付きのトランザクションを開始する
    async fn begin(&self, tenant_id: &TenantId) -> Result<TxContext, InfraError>;
}

/// Postgres 用 TransactionManager 実装
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id))]
    async fn begin(&self, tenant_id: &TenantId) -> Result<TxContext, InfraError> {
        TxContext::begin_pg(&self.pool, tenant_id).await
    }
}
