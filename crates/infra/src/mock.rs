//! # テスト用モックリポジトリ
//!
//! ハンドラテストで使用するインメモリモックリポジトリ。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! stocker-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 書き込みは `TxContext::stage` に積まれ、コミット時にだけ反映される。
//! コミット失敗やドロップ時には何も反映されないため、
//! 「すべて反映されるか何も反映されないか」をモックでも検証できる。

use std::sync::{
   Arc,
   Mutex,
   atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use stocker_domain::{
   backup::{Backup, BackupFilter, BackupId, BackupStatistics},
   backup_quota::BackupQuota,
   security_settings::SecuritySettings,
   tenant::{Tenant, TenantId},
};
use stocker_shared::{PageRequest, PagedResult};
use tokio::sync::Barrier;

use crate::{
   db::{TransactionManager, TxContext},
   error::InfraError,
   repository::{
      BackupQuotaRepository,
      BackupRepository,
      SecuritySettingsRepository,
      TenantRepository,
   },
};

/// 読み取り失敗を注入するフラグ
#[derive(Clone, Default)]
struct ReadFailure(Arc<AtomicBool>);

impl ReadFailure {
   fn enable(&self) {
      self.0.store(true, Ordering::SeqCst);
   }

   fn check(&self) -> Result<(), InfraError> {
      if self.0.load(Ordering::SeqCst) {
         return Err(InfraError::unexpected("mock read failure"));
      }
      Ok(())
   }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Result<PagedResult<T>, InfraError> {
   let total = items.len() as u64;
   let items = items
      .into_iter()
      .skip(page.offset() as usize)
      .take(page.limit() as usize)
      .collect();
   PagedResult::new(items, page, total).map_err(|e| InfraError::unexpected(e.to_string()))
}

// ===== MockTenantRepository =====

#[derive(Clone, Default)]
pub struct MockTenantRepository {
   tenants:     Arc<Mutex<Vec<Tenant>>>,
   fail_reads:  ReadFailure,
   lookups:     Arc<AtomicUsize>,
}

impl MockTenantRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn add_tenant(&self, tenant: Tenant) {
      self.tenants.lock().unwrap().push(tenant);
   }

   pub fn get(&self, id: &TenantId) -> Option<Tenant> {
      self
         .tenants
         .lock()
         .unwrap()
         .iter()
         .find(|t| t.id() == id)
         .cloned()
   }

   /// 以降の読み取りをすべて失敗させる
   pub fn fail_reads(&self) {
      self.fail_reads.enable();
   }

   /// `find_by_id` が呼ばれた回数
   pub fn lookup_count(&self) -> usize {
      self.lookups.load(Ordering::SeqCst)
   }
}

#[async_trait]
impl TenantRepository for MockTenantRepository {
   async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, InfraError> {
      self.lookups.fetch_add(1, Ordering::SeqCst);
      self.fail_reads.check()?;
      Ok(self.get(id))
   }

   async fn find_page(&self, page: PageRequest) -> Result<PagedResult<Tenant>, InfraError> {
      self.fail_reads.check()?;
      let tenants = self.tenants.lock().unwrap().clone();
      paginate(tenants, page)
   }

   async fn update_status(&self, tx: &mut TxContext, tenant: &Tenant) -> Result<(), InfraError> {
      if self.get(tenant.id()).is_none() {
         return Err(InfraError::conflict("Tenant", tenant.id().to_string()));
      }
      let tenants = Arc::clone(&self.tenants);
      let tenant = tenant.clone();
      tx.stage(move || {
         let mut tenants = tenants.lock().unwrap();
         if let Some(pos) = tenants.iter().position(|t| t.id() == tenant.id()) {
            tenants[pos] = tenant;
         }
      });
      Ok(())
   }
}

// ===== MockBackupRepository =====

#[derive(Clone, Default)]
pub struct MockBackupRepository {
   backups:    Arc<Mutex<Vec<Backup>>>,
   fail_reads: ReadFailure,
}

impl MockBackupRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn add_backup(&self, backup: Backup) {
      self.backups.lock().unwrap().push(backup);
   }

   /// テナントを問わず ID で取得する（検証用）
   pub fn get(&self, id: &BackupId) -> Option<Backup> {
      self
         .backups
         .lock()
         .unwrap()
         .iter()
         .find(|b| b.id() == id)
         .cloned()
   }

   pub fn count(&self) -> usize {
      self.backups.lock().unwrap().len()
   }

   pub fn fail_reads(&self) {
      self.fail_reads.enable();
   }

   fn tenant_backups(&self, tenant_id: &TenantId) -> Vec<Backup> {
      self
         .backups
         .lock()
         .unwrap()
         .iter()
         .filter(|b| b.tenant_id() == tenant_id)
         .cloned()
         .collect()
   }
}

#[async_trait]
impl BackupRepository for MockBackupRepository {
   async fn find_by_id(
      &self,
      id: &BackupId,
      tenant_id: &TenantId,
   ) -> Result<Option<Backup>, InfraError> {
      self.fail_reads.check()?;
      Ok(self.get(id).filter(|b| b.tenant_id() == tenant_id))
   }

   async fn find_page(
      &self,
      tenant_id: &TenantId,
      filter: &BackupFilter,
      page: PageRequest,
   ) -> Result<PagedResult<Backup>, InfraError> {
      self.fail_reads.check()?;
      let mut backups: Vec<Backup> = self
         .tenant_backups(tenant_id)
         .into_iter()
         .filter(|b| filter.matches(b))
         .collect();
      backups.sort_by_key(|b| b.created_at());
      if filter.sort_descending {
         backups.reverse();
      }
      paginate(backups, page)
   }

   async fn statistics(&self, tenant_id: &TenantId) -> Result<BackupStatistics, InfraError> {
      self.fail_reads.check()?;
      Ok(BackupStatistics::from_backups(
         &self.tenant_backups(tenant_id),
      ))
   }

   async fn insert(&self, tx: &mut TxContext, backup: &Backup) -> Result<(), InfraError> {
      let backups = Arc::clone(&self.backups);
      let backup = backup.clone();
      tx.stage(move || backups.lock().unwrap().push(backup));
      Ok(())
   }

   async fn update_with_version_check(
      &self,
      tx: &mut TxContext,
      backup: &Backup,
      expected_version: u32,
   ) -> Result<(), InfraError> {
      match self.get(backup.id()) {
         Some(current)
            if current.tenant_id() == backup.tenant_id()
               && current.version() == expected_version => {}
         _ => return Err(InfraError::conflict("Backup", backup.id().to_string())),
      }
      let repo = self.clone();
      let id = backup.id().clone();
      tx.check_on_commit(move || match repo.get(&id) {
         Some(current) if current.version() == expected_version => Ok(()),
         _ => Err(InfraError::conflict("Backup", id.to_string())),
      });
      let backups = Arc::clone(&self.backups);
      let backup = backup.clone();
      tx.stage(move || {
         let mut backups = backups.lock().unwrap();
         if let Some(pos) = backups.iter().position(|b| b.id() == backup.id()) {
            backups[pos] = backup;
         }
      });
      Ok(())
   }

   async fn delete(
      &self,
      tx: &mut TxContext,
      id: &BackupId,
      tenant_id: &TenantId,
   ) -> Result<(), InfraError> {
      if self.get(id).filter(|b| b.tenant_id() == tenant_id).is_none() {
         return Err(InfraError::conflict("Backup", id.to_string()));
      }
      let backups = Arc::clone(&self.backups);
      let id = id.clone();
      tx.stage(move || backups.lock().unwrap().retain(|b| b.id() != &id));
      Ok(())
   }
}

// ===== MockBackupQuotaRepository =====

#[derive(Clone, Default)]
pub struct MockBackupQuotaRepository {
   quotas: Arc<Mutex<Vec<BackupQuota>>>,
}

impl MockBackupQuotaRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn set_quota(&self, quota: BackupQuota) {
      let mut quotas = self.quotas.lock().unwrap();
      quotas.retain(|q| q.tenant_id() != quota.tenant_id());
      quotas.push(quota);
   }

   pub fn get(&self, tenant_id: &TenantId) -> Option<BackupQuota> {
      self
         .quotas
         .lock()
         .unwrap()
         .iter()
         .find(|q| q.tenant_id() == tenant_id)
         .cloned()
   }

   fn check_version(&self, tenant_id: &TenantId, expected_version: u32) -> Result<(), InfraError> {
      let current = self.get(tenant_id).map_or(0, |q| q.version());
      if current != expected_version {
         return Err(InfraError::conflict("BackupQuota", tenant_id.to_string()));
      }
      Ok(())
   }
}

#[async_trait]
impl BackupQuotaRepository for MockBackupQuotaRepository {
   async fn find_by_tenant(&self, tenant_id: &TenantId) -> Result<Option<BackupQuota>, InfraError> {
      Ok(self.get(tenant_id))
   }

   async fn save_with_version_check(
      &self,
      tx: &mut TxContext,
      quota: &BackupQuota,
      expected_version: u32,
   ) -> Result<(), InfraError> {
      self.check_version(quota.tenant_id(), expected_version)?;

      let repo = self.clone();
      let tenant_id = quota.tenant_id().clone();
      tx.check_on_commit(move || repo.check_version(&tenant_id, expected_version));

      let repo = self.clone();
      let quota = quota.clone();
      tx.stage(move || repo.set_quota(quota));
      Ok(())
   }
}

// ===== MockSecuritySettingsRepository =====

#[derive(Clone, Default)]
pub struct MockSecuritySettingsRepository {
   settings: Arc<Mutex<Vec<SecuritySettings>>>,
}

impl MockSecuritySettingsRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn put(&self, settings: SecuritySettings) {
      let mut all = self.settings.lock().unwrap();
      all.retain(|s| s.tenant_id() != settings.tenant_id());
      all.push(settings);
   }

   pub fn get(&self, tenant_id: &TenantId) -> Option<SecuritySettings> {
      self
         .settings
         .lock()
         .unwrap()
         .iter()
         .find(|s| s.tenant_id() == tenant_id)
         .cloned()
   }

   fn check_version(&self, tenant_id: &TenantId, expected_version: u32) -> Result<(), InfraError> {
      let current = self.get(tenant_id).map_or(0, |s| s.version());
      if current != expected_version {
         return Err(InfraError::conflict("SecuritySettings", tenant_id.to_string()));
      }
      Ok(())
   }
}

#[async_trait]
impl SecuritySettingsRepository for MockSecuritySettingsRepository {
   async fn find_by_tenant(
      &self,
      tenant_id: &TenantId,
   ) -> Result<Option<SecuritySettings>, InfraError> {
      Ok(self.get(tenant_id))
   }

   async fn save_with_version_check(
      &self,
      tx: &mut TxContext,
      settings: &SecuritySettings,
      expected_version: u32,
   ) -> Result<(), InfraError> {
      self.check_version(settings.tenant_id(), expected_version)?;

      let repo = self.clone();
      let tenant_id = settings.tenant_id().clone();
      tx.check_on_commit(move || repo.check_version(&tenant_id, expected_version));

      let repo = self.clone();
      let settings = settings.clone();
      tx.stage(move || repo.put(settings));
      Ok(())
   }
}

// ===== MockTransactionManager =====

/// モック TransactionManager
///
/// `failing_commit()` で作成すると、開始したトランザクションのコミットが失敗する。
/// `with_begin_barrier(n)` で作成すると、`begin` は n 件のトランザクションが
/// 揃うまで待つ。読み取りを終えた並行リクエストが同時に書き込む状況を再現できる。
#[derive(Clone, Default)]
pub struct MockTransactionManager {
   fail_on_commit: bool,
   begun:          Arc<AtomicUsize>,
   begin_barrier:  Option<Arc<Barrier>>,
}

impl MockTransactionManager {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn failing_commit() -> Self {
      Self {
         fail_on_commit: true,
         begun:          Arc::default(),
         begin_barrier:  None,
      }
   }

   pub fn with_begin_barrier(parties: usize) -> Self {
      Self {
         fail_on_commit: false,
         begun:          Arc::default(),
         begin_barrier:  Some(Arc::new(Barrier::new(parties))),
      }
   }

   /// 開始されたトランザクション数
   pub fn begun_count(&self) -> usize {
      self.begun.load(Ordering::SeqCst)
   }
}

#[async_trait]
impl TransactionManager for MockTransactionManager {
   async fn begin(&self, _tenant_id: &TenantId) -> Result<TxContext, InfraError> {
      self.begun.fetch_add(1, Ordering::SeqCst);
      if let Some(barrier) = &self.begin_barrier {
         barrier.wait().await;
      }
      Ok(if self.fail_on_commit {
         TxContext::mock_failing_commit()
      } else {
         TxContext::mock()
      })
   }
}
