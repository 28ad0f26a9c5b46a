//! SourceResolver
//!
//! ## 責務
//!
//! - 監視対象ハンドルを上流の数値 ID に解決する
//! - 解決結果をプロセスの生存期間中キャッシュする (同じハンドルの外部問い合わせは 1 回のみ)
//! - キャッシュのみを参照した監視対象一覧を返す (外部問い合わせを待たない)
//!
//! ## 設計ノート
//!
//! キャッシュのロックはマップへのアクセス中のみ保持し、外部問い合わせ中は保持しない。
//! 外部問い合わせはハンドルごとのゲートで直列化し、同じハンドルの問い合わせは同時に 1 件まで。
//! 待っていた呼び出しは先行した問い合わせの結果をキャッシュから受け取る。
//! 失敗はキャッシュしないため、次回の呼び出しで再試行される。
//! 複数ハンドルの解決は並行して行う。

use std::{collections::HashMap, sync::Arc};

use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::domain::{
    MonitoredSource, PeerDirectory, ResolveError, SourceId, UNRESOLVED, normalize_handle,
};

pub struct SourceResolver {
    directory: Arc<dyn PeerDirectory>,
    cache: Mutex<HashMap<String, SourceId>>,
    /// Held while a lookup for the handle is in flight
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SourceResolver {
    pub fn new(directory: Arc<dyn PeerDirectory>) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `handle`, returning [`UNRESOLVED`] on failure.
    pub async fn resolve(&self, handle: &str) -> SourceId {
        match self.try_resolve(handle).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("{}", e);
                UNRESOLVED
            }
        }
    }

    /// Resolve `handle`, reporting why resolution failed
    pub async fn try_resolve(&self, handle: &str) -> Result<SourceId, ResolveError> {
        let handle = normalize_handle(handle);
        if handle.is_empty() {
            return Err(ResolveError::EmptyHandle);
        }

        if let Some(id) = self.cached_id(handle).await {
            return Ok(id);
        }

        let gate = self.gate(handle).await;
        let _in_flight = gate.lock().await;
        if let Some(id) = self.cached_id(handle).await {
            return Ok(id);
        }

        let id = self.directory.resolve_domain(handle).await?;
        self.cache.lock().await.insert(handle.to_string(), id);
        tracing::info!("Resolved source '@{}' to {}", handle, id);
        Ok(id)
    }

    /// Resolve every handle concurrently. A failed handle is returned unresolved.
    pub async fn resolve_all(&self, handles: &[String]) -> Vec<MonitoredSource> {
        join_all(handles.iter().map(|handle| async move {
            match self.try_resolve(handle).await {
                Ok(id) => MonitoredSource::resolved(handle, id),
                Err(e) => {
                    tracing::warn!("{}", e);
                    MonitoredSource::unresolved(handle)
                }
            }
        }))
        .await
    }

    /// Sources as currently cached, without any lookup
    pub async fn cached_sources(&self, handles: &[String]) -> Vec<MonitoredSource> {
        let cache = self.cache.lock().await;
        handles
            .iter()
            .map(|handle| match cache.get(normalize_handle(handle)) {
                Some(&id) => MonitoredSource::resolved(handle, id),
                None => MonitoredSource::unresolved(handle),
            })
            .collect()
    }

    /// Number of cached handles
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn cached_id(&self, handle: &str) -> Option<SourceId> {
        self.cache.lock().await.get(handle).copied()
    }

    async fn gate(&self, handle: &str) -> Arc<Mutex<()>> {
        self.gates
            .lock()
            .await
            .entry(handle.to_string())
            .or_default()
            .clone()
    }
}
