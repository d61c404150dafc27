//! # Clock（時刻プロバイダ）
//!
//! ハンドラでの `Utc::now()` 直接呼び出しを置き換え、
//! テストで時刻を注入可能にするための抽象化。

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// 現在時刻を提供するトレイト
pub trait Clock: Send + Sync {
   fn now(&self) -> DateTime<Utc>;
}

/// 実際のシステム時刻を返す実装
pub struct SystemClock;

impl Clock for SystemClock {
   fn now(&self) -> DateTime<Utc> {
      Utc::now()
   }
}

/// テスト用の手動で進める時計
///
/// `advance` を呼ぶまで同じ時刻を返し続ける。
pub struct FixedClock {
   now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
   pub fn new(now: DateTime<Utc>) -> Self {
      Self {
         now: Mutex::new(now),
      }
   }

   /// 時刻を進める
   pub fn advance(&self, by: Duration) {
      let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      *now += by;
   }
}

impl Clock for FixedClock {
   fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
   }
}
