//! # ハンドラレジストリ
//!
//! リクエスト型からハンドラへの 1 対 1 の対応を保持する。
//!
//! ## 設計方針
//!
//! - 起動時に [`HandlerRegistryBuilder`] で一度だけ構築し、以降は読み取り専用
//! - グローバル状態にせず、構築した値を `Arc` でディスパッチャに渡す
//! - 同じリクエスト型の二重登録はエラー
//! - `require` で宣言した型が未登録なら `build` がエラーを返す。
//!   リクエストを処理し始める前に設定漏れを検出できる

use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    sync::Arc,
};

use thiserror::Error;

use super::{handler::Handler, request::Request};

/// レジストリ構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// 同じリクエスト型に 2 つ目のハンドラを登録しようとした
    #[error("{request} のハンドラは既に登録されています")]
    DuplicateHandler { request: &'static str },

    /// 別のリクエスト型が同じ名前を使っている
    #[error("リクエスト名 {name} が重複しています")]
    DuplicateRequestName { name: &'static str },

    /// 必須のリクエスト型にハンドラが登録されていない
    #[error("ハンドラが登録されていません: {}", .0.join(", "))]
    MissingHandlers(Vec<&'static str>),
}

struct Binding {
    name:    &'static str,
    /// `Arc<dyn Handler<R>>` を保持する
    handler: Box<dyn Any + Send + Sync>,
}

/// ハンドラレジストリ
pub struct HandlerRegistry {
    bindings: HashMap<TypeId, Binding>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// リクエスト型に対応するハンドラを取得する
    pub fn resolve<R: Request>(&self) -> Option<Arc<dyn Handler<R>>> {
        self.bindings
            .get(&TypeId::of::<R>())
            .and_then(|binding| binding.handler.downcast_ref::<Arc<dyn Handler<R>>>())
            .cloned()
    }

    pub fn contains<R: Request>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<R>())
    }

    /// 登録済みのリクエスト名（昇順）
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.values().map(|b| b.name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.registered_names())
            .finish()
    }
}

/// [`HandlerRegistry`] のビルダー
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    bindings: HashMap<TypeId, Binding>,
    names:    HashSet<&'static str>,
    required: Vec<(TypeId, &'static str)>,
}

impl HandlerRegistryBuilder {
    /// ハンドラを登録する
    pub fn register<R, H>(self, handler: H) -> Result<Self, RegistryError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.register_shared::<R>(Arc::new(handler))
    }

    /// 共有済みのハンドラを登録する
    pub fn register_shared<R: Request>(
        mut self,
        handler: Arc<dyn Handler<R>>,
    ) -> Result<Self, RegistryError> {
        let type_id = TypeId::of::<R>();
        if self.bindings.contains_key(&type_id) {
            return Err(RegistryError::DuplicateHandler { request: R::NAME });
        }
        if !self.names.insert(R::NAME) {
            return Err(RegistryError::DuplicateRequestName { name: R::NAME });
        }

        tracing::debug!(request.name = R::NAME, request.kind = %R::KIND, "ハンドラを登録");
        self.bindings.insert(
            type_id,
            Binding {
                name:    R::NAME,
                handler: Box::new(handler),
            },
        );
        Ok(self)
    }

    /// 起動時に必ず登録されているべきリクエスト型を宣言する
    pub fn require<R: Request>(mut self) -> Self {
        self.required.push((TypeId::of::<R>(), R::NAME));
        self
    }

    /// レジストリを構築する
    ///
    /// `require` で宣言した型に未登録のものがあれば `MissingHandlers` を返す。
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        let missing: Vec<&'static str> = self
            .required
            .iter()
            .filter(|(type_id, _)| !self.bindings.contains_key(type_id))
            .map(|(_, name)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingHandlers(missing));
        }

        Ok(HandlerRegistry {
            bindings: self.bindings,
        })
    }
}
