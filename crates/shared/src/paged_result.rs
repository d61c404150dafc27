//! # ページング付き結果
//!
//! オフセットベース（ページ番号 + ページサイズ）のページングに対応した結果型。
//!
//! ## 設計方針
//!
//! - 入力は [`PageRequest`]、出力は [`PagedResult`] に分離する
//! - どちらもコンストラクタで不変条件を検証し、不正な値を持つインスタンスを作らせない
//! - `total_pages` / `has_next` / `has_previous` は保持せず、都度導出する
//!
//! ## JSON 形式
//!
//! ```json
//! {
//!   "items": [...],
//!   "total_count": 25,
//!   "page_number": 1,
//!   "page_size": 10
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// ページサイズの上限
pub const MAX_PAGE_SIZE: u32 = 100;

/// ページサイズの既定値
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// ページング値の不正
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
   #[error("ページ番号は 1 以上である必要があります（指定値: {0}）")]
   InvalidPageNumber(u32),

   #[error("ページサイズは 1 以上 {MAX_PAGE_SIZE} 以下である必要があります（指定値: {0}）")]
   InvalidPageSize(u32),

   #[error("1 ページの件数 {items} がページサイズ {page_size} を超えています")]
   TooManyItems { items: usize, page_size: u32 },
}

/// ページ指定
///
/// `page_number` は 1 始まり。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
   page_number: u32,
   page_size:   u32,
}

impl PageRequest {
   pub fn new(page_number: u32, page_size: u32) -> Result<Self, PaginationError> {
      if page_number == 0 {
         return Err(PaginationError::InvalidPageNumber(page_number));
      }
      if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
         return Err(PaginationError::InvalidPageSize(page_size));
      }
      Ok(Self {
         page_number,
         page_size,
      })
   }

   pub fn page_number(&self) -> u32 {
      self.page_number
   }

   pub fn page_size(&self) -> u32 {
      self.page_size
   }

   /// SQL の `OFFSET` に渡す値
   pub fn offset(&self) -> u64 {
      u64::from(self.page_number - 1) * u64::from(self.page_size)
   }

   /// SQL の `LIMIT` に渡す値
   pub fn limit(&self) -> u64 {
      u64::from(self.page_size)
   }
}

impl Default for PageRequest {
   fn default() -> Self {
      Self {
         page_number: 1,
         page_size:   DEFAULT_PAGE_SIZE,
      }
   }
}

/// ページング付き結果
///
/// 不変条件:
/// - `items.len() <= page_size`
/// - `page_number >= 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedResult<T> {
   items:       Vec<T>,
   total_count: u64,
   page_number: u32,
   page_size:   u32,
}

impl<T> PagedResult<T> {
   /// 1 ページ分のアイテムと総件数から結果を組み立てる
   pub fn new(items: Vec<T>, page: PageRequest, total_count: u64) -> Result<Self, PaginationError> {
      if items.len() > page.page_size() as usize {
         return Err(PaginationError::TooManyItems {
            items:     items.len(),
            page_size: page.page_size(),
         });
      }
      Ok(Self {
         items,
         total_count,
         page_number: page.page_number(),
         page_size:   page.page_size(),
      })
   }

   /// 該当 0 件の結果
   pub fn empty(page: PageRequest) -> Self {
      Self {
         items:       Vec::new(),
         total_count: 0,
         page_number: page.page_number(),
         page_size:   page.page_size(),
      }
   }

   pub fn items(&self) -> &[T] {
      &self.items
   }

   pub fn into_items(self) -> Vec<T> {
      self.items
   }

   pub fn total_count(&self) -> u64 {
      self.total_count
   }

   pub fn page_number(&self) -> u32 {
      self.page_number
   }

   pub fn page_size(&self) -> u32 {
      self.page_size
   }

   /// 総ページ数（`ceil(total_count / page_size)`）
   pub fn total_pages(&self) -> u64 {
      self.total_count.div_ceil(u64::from(self.page_size))
   }

   pub fn has_next(&self) -> bool {
      u64::from(self.page_number) < self.total_pages()
   }

   pub fn has_previous(&self) -> bool {
      self.page_number > 1
   }

   /// アイテムを変換する（ページ情報は保持する）
   pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
      PagedResult {
         items:       self.items.into_iter().map(f).collect(),
         total_count: self.total_count,
         page_number: self.page_number,
         page_size:   self.page_size,
      }
   }
}
