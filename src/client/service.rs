// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cached, de-duplicated entity loading for the signed-in session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::remote::{RemoteDataSource, RemoteError};
use crate::cache::{EntityCache, EntityKind};
use crate::connection::{ConnectionState, ProviderSnapshot};
use crate::lending::{PortfolioEntry, UserProfile};
use crate::storage::KeyValueStore;

/// Result of a load request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    Loaded { data: Vec<T>, from_cache: bool },
    /// Not authenticated, or the provider is not ready yet.
    NotReady,
    /// Another load for the same entity kind is in flight.
    AlreadyLoading,
    /// The response arrived after shutdown or after the session changed.
    Discarded,
}

impl<T> LoadOutcome<T> {
    pub fn data(&self) -> Option<&[T]> {
        match self {
            LoadOutcome::Loaded { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// What the services read from the session: the provider snapshot for the
/// signed-in user and the controller's published state for readiness.
#[derive(Clone)]
pub struct SessionView {
    provider: watch::Receiver<ProviderSnapshot>,
    connection: watch::Receiver<ConnectionState>,
}

impl SessionView {
    pub fn new(
        provider: watch::Receiver<ProviderSnapshot>,
        connection: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            provider,
            connection,
        }
    }

    /// The signed-in user's id, when `authenticated && ready`.
    pub fn live_user(&self) -> Option<String> {
        let ready = self.connection.borrow().is_ready;
        let provider = self.provider.borrow();
        if !(ready && provider.authenticated) {
            return None;
        }
        provider.user.as_ref().map(|u| u.id.clone())
    }
}

/// Per-kind fetch and post-processing.
#[async_trait]
pub trait EntitySource: Send + Sync + 'static {
    type Item: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    const KIND: EntityKind;

    async fn fetch(
        &self,
        remote: &dyn RemoteDataSource,
        user_id: &str,
    ) -> Result<Vec<Self::Item>, RemoteError>;

    /// Applied to every result, cached or fresh.
    fn finish(&self, items: Vec<Self::Item>, _now: DateTime<Utc>) -> Vec<Self::Item> {
        items
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioSource;

#[async_trait]
impl EntitySource for PortfolioSource {
    type Item = PortfolioEntry;

    const KIND: EntityKind = EntityKind::Portfolio;

    async fn fetch(
        &self,
        remote: &dyn RemoteDataSource,
        user_id: &str,
    ) -> Result<Vec<PortfolioEntry>, RemoteError> {
        remote.fetch_portfolio(user_id).await
    }

    fn finish(&self, items: Vec<PortfolioEntry>, now: DateTime<Utc>) -> Vec<PortfolioEntry> {
        items.into_iter().map(|e| e.with_derived(now)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileSource;

#[async_trait]
impl EntitySource for ProfileSource {
    type Item = UserProfile;

    const KIND: EntityKind = EntityKind::Profile;

    async fn fetch(
        &self,
        remote: &dyn RemoteDataSource,
        user_id: &str,
    ) -> Result<Vec<UserProfile>, RemoteError> {
        Ok(vec![remote.fetch_profile(user_id).await?])
    }
}

/// Clears the loading marker when the fetch ends, however it ends.
struct LoadingGuard(Arc<AtomicBool>);

impl LoadingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Loads one entity kind for the live session.
///
/// Clones share the cache slot, the loading marker and the shutdown scope.
pub struct EntityService<S: EntitySource> {
    source: Arc<S>,
    cache: EntityCache<S::Item>,
    remote: Arc<dyn RemoteDataSource>,
    session: SessionView,
    loading: Arc<AtomicBool>,
    scope: CancellationToken,
}

pub type PortfolioService = EntityService<PortfolioSource>;
pub type ProfileService = EntityService<ProfileSource>;

impl<S: EntitySource> Clone for EntityService<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
            remote: Arc::clone(&self.remote),
            session: self.session.clone(),
            loading: Arc::clone(&self.loading),
            scope: self.scope.clone(),
        }
    }
}

impl<S: EntitySource + Default> EntityService<S> {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteDataSource>,
        session: SessionView,
    ) -> Self {
        Self::with_cache(EntityCache::new(S::KIND, store), remote, session)
    }

    pub fn with_cache(
        cache: EntityCache<S::Item>,
        remote: Arc<dyn RemoteDataSource>,
        session: SessionView,
    ) -> Self {
        Self {
            source: Arc::new(S::default()),
            cache,
            remote,
            session,
            loading: Arc::new(AtomicBool::new(false)),
            scope: CancellationToken::new(),
        }
    }
}

impl<S: EntitySource> EntityService<S> {
    /// Serve the cached snapshot if fresh, otherwise fetch and cache.
    pub async fn load(&self) -> Result<LoadOutcome<S::Item>, RemoteError> {
        if self.scope.is_cancelled() {
            return Ok(LoadOutcome::Discarded);
        }
        let Some(user_id) = self.session.live_user() else {
            return Ok(LoadOutcome::NotReady);
        };
        let Some(_guard) = LoadingGuard::acquire(&self.loading) else {
            debug!(kind = ?S::KIND, "Load already in flight");
            return Ok(LoadOutcome::AlreadyLoading);
        };

        if let Some(cached) = self.cache.get() {
            debug!(kind = ?S::KIND, count = cached.len(), "Serving cached snapshot");
            return Ok(LoadOutcome::Loaded {
                data: self.source.finish(cached, Utc::now()),
                from_cache: true,
            });
        }

        let fetched = self.source.fetch(self.remote.as_ref(), &user_id).await;

        if self.scope.is_cancelled() {
            debug!(kind = ?S::KIND, "Discarding response after shutdown");
            return Ok(LoadOutcome::Discarded);
        }
        if self.session.live_user().as_deref() != Some(user_id.as_str()) {
            debug!(kind = ?S::KIND, "Discarding response for a stale session");
            return Ok(LoadOutcome::Discarded);
        }

        let items = fetched?;
        self.cache.set(&items);
        info!(kind = ?S::KIND, count = items.len(), "Fetched fresh snapshot");

        Ok(LoadOutcome::Loaded {
            data: self.source.finish(items, Utc::now()),
            from_cache: false,
        })
    }

    /// Drop the cached snapshot and load again.
    pub async fn refresh(&self) -> Result<LoadOutcome<S::Item>, RemoteError> {
        self.cache.clear();
        self.load().await
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn last_updated(&self) -> Option<String> {
        self.cache.get_last_updated()
    }

    /// Stop applying responses. In-flight fetches resolve to `Discarded`.
    pub fn shutdown(&self) {
        self.scope.cancel();
    }
}
