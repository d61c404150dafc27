//! # バックアップ枠
//!
//! テナントごとの月間バックアップ上限と当月の使用数。
//! 月が変わると使用数は 0 に戻る。
//!
//! 同時に受け付けたバックアップで上限を超えないよう、`version` で楽観的ロックを行う。
//! 未保存の枠は `version` が 0。

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::{DomainError, DomainResult, tenant::TenantId};

/// 上限が未設定のテナントに適用する月間上限
pub const DEFAULT_MAX_BACKUPS_PER_MONTH: u32 = 30;

/// バックアップ枠
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupQuota {
   tenant_id:             TenantId,
   max_backups_per_month: u32,
   used_this_period:      u32,
   /// 集計期間の開始日（月初）
   period_start:          NaiveDate,
   version:               u32,
}

impl BackupQuota {
   /// 当月分の空の枠を作成する
   pub fn new(tenant_id: TenantId, max_backups_per_month: u32, now: DateTime<Utc>) -> Self {
      Self {
         tenant_id,
         max_backups_per_month,
         used_this_period: 0,
         period_start: month_start(now),
         version: 0,
      }
   }

   /// データベースから復元する
   pub fn from_db(
      tenant_id: TenantId,
      max_backups_per_month: u32,
      used_this_period: u32,
      period_start: NaiveDate,
      version: u32,
   ) -> Self {
      Self {
         tenant_id,
         max_backups_per_month,
         used_this_period,
         period_start,
         version,
      }
   }

   pub fn tenant_id(&self) -> &TenantId {
      &self.tenant_id
   }

   pub fn max_backups_per_month(&self) -> u32 {
      self.max_backups_per_month
   }

   pub fn used_this_period(&self) -> u32 {
      self.used_this_period
   }

   pub fn period_start(&self) -> NaiveDate {
      self.period_start
   }

   /// 楽観的ロックのバージョン（未保存なら 0）
   pub fn version(&self) -> u32 {
      self.version
   }

   /// 残り回数（`now` の属する月で計算）
   pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
      let used = if self.period_start == month_start(now) {
         self.used_this_period
      } else {
         0
      };
      self.max_backups_per_month.saturating_sub(used)
   }

   /// 1 回分を消費した新しい枠を返す
   ///
   /// # Errors
   ///
   /// 当月の上限に達している場合は `Forbidden`（`Backup.QuotaExceeded`）。
   pub fn consume(self, now: DateTime<Utc>) -> DomainResult<Self> {
      let current = month_start(now);
      let used = if self.period_start == current {
         self.used_this_period
      } else {
         0
      };

      if used >= self.max_backups_per_month {
         return Err(DomainError::forbidden(
            "Backup.QuotaExceeded",
            format!(
               "今月のバックアップ上限（{} 回）に達しています",
               self.max_backups_per_month
            ),
         ));
      }

      Ok(Self {
         used_this_period: used + 1,
         period_start: current,
         version: self.version + 1,
         ..self
      })
   }
}

fn month_start(now: DateTime<Utc>) -> NaiveDate {
   now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive())
}
