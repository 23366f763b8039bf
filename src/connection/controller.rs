// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connection Controller
//!
//! Reconciles the embedded-wallet provider's asynchronous readiness signals
//! into a single [`ConnectionState`] and drives the bounded retry policy.
//!
//! ## Transitions
//!
//! | From | Event | Effect |
//! |------|-------|--------|
//! | INIT | mount | connecting, quality `poor`, connect timeout armed |
//! | CONNECTING | `ready` | ready, not connecting, error cleared, timeout cancelled |
//! | CONNECTING | timeout (15 s) | error "Connection timeout…" |
//! | any | `ready && authenticated` | after 1 s settle, 3 s wallet probe |
//! | any | wallet-transport error | quality `failed`, wallet not ready, error |
//! | ERROR | `retry()` | staged: purge storage from attempt 3, reload at 5 |
//!
//! ## Scoping
//!
//! Every timer runs on a child of the controller's scope token. Dropping the
//! controller (or calling [`ConnectionController::unmount`]) cancels the
//! scope, and every timer callback re-checks its token before touching state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::RuntimeEvent;
use super::probe::{Reloader, WalletProbe};
use super::provider::ProviderSignals;
use super::state::{ConnectionPatch, ConnectionQuality, ConnectionState};
use crate::storage::{KeyValueStore, PRIVY_CONNECTIONS_KEY, PRIVY_WALLET_KEY};

/// Error recorded when `retry()` is called with the budget spent.
pub const MAX_RETRIES_MESSAGE: &str = "Maximum retry attempts reached. Please refresh the page.";

/// Timers and thresholds for the controller.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long the provider has to report `ready` after mount or retry.
    pub connect_timeout: Duration,
    /// Delay between `ready && authenticated` and the wallet probe.
    pub settle_delay: Duration,
    /// Upper bound on a single wallet probe.
    pub probe_timeout: Duration,
    /// Delay between `force_reconnect()` and its retry.
    pub force_reconnect_delay: Duration,
    /// Delay before the environment reload on the final attempt.
    pub reload_delay: Duration,
    /// Retry budget per session.
    pub max_retries: u32,
    /// First attempt that purges persisted provider keys.
    pub purge_from_attempt: u32,
    /// Retry automatically after a recognised transport error or timeout.
    pub auto_retry: bool,
    pub auto_retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(3),
            force_reconnect_delay: Duration::from_millis(500),
            reload_delay: Duration::from_secs(1),
            max_retries: 5,
            purge_from_attempt: 3,
            auto_retry: false,
            auto_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Collaborators the controller acts on.
#[derive(Clone)]
pub struct ConnectionDeps {
    /// Durable client storage holding the provider's persisted keys.
    pub durable: Arc<dyn KeyValueStore>,
    /// Session-scoped storage, cleared on escalated retries.
    pub session: Arc<dyn KeyValueStore>,
    pub probe: Arc<dyn WalletProbe>,
    pub reloader: Arc<dyn Reloader>,
}

/// Result of a `retry()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Resumed in-process as the given attempt.
    Retrying { attempt: u32 },
    /// The final attempt: an environment reload is scheduled.
    ReloadScheduled { attempt: u32 },
    /// Budget already spent; the terminal error was recorded.
    Exhausted,
}

pub(super) struct ControllerInner {
    config: ConnectionConfig,
    deps: ConnectionDeps,
    state: watch::Sender<ConnectionState>,
    signals: Mutex<ProviderSignals>,
    pub(super) scope: CancellationToken,
    connect_timer: Mutex<Option<CancellationToken>>,
    wallet_check: Mutex<Option<CancellationToken>>,
}

/// Owns the session's [`ConnectionState`].
///
/// Must be created inside a tokio runtime; timers are spawned tasks.
pub struct ConnectionController {
    pub(super) inner: Arc<ControllerInner>,
}

impl ConnectionController {
    /// INIT → CONNECTING. Arms the connect timeout.
    pub fn mount(config: ConnectionConfig, deps: ConnectionDeps) -> Self {
        let initial = ConnectionState {
            is_connecting: true,
            connection_quality: ConnectionQuality::Poor,
            retry_count: 0,
            ..Default::default()
        };
        let (state, _) = watch::channel(initial);

        let inner = Arc::new(ControllerInner {
            config,
            deps,
            state,
            signals: Mutex::new(ProviderSignals::default()),
            scope: CancellationToken::new(),
            connect_timer: Mutex::new(None),
            wallet_check: Mutex::new(None),
        });
        inner.arm_connect_timeout();

        debug!("Connection controller mounted");
        Self { inner }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Apply the latest provider signals.
    pub fn observe(&self, signals: ProviderSignals) {
        self.inner.observe(signals);
    }

    /// Feed a runtime error event. Returns whether it was a recognised
    /// wallet-transport failure. Never fails.
    pub fn handle_runtime_event(&self, event: &RuntimeEvent) -> bool {
        self.inner.handle_runtime_event(event)
    }

    /// Staged retry. See [`RetryOutcome`].
    pub fn retry(&self) -> RetryOutcome {
        self.inner.retry()
    }

    /// Mark connecting, clear the error and bump the retry counter.
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Drop wallet readiness, purge the provider's wallet keys, then retry
    /// after a short delay.
    pub fn force_reconnect(&self) {
        self.inner.force_reconnect();
    }

    /// Tear down: cancel every pending timer.
    pub fn unmount(self) {
        // Drop does the work
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.inner.scope.cancel();
        debug!("Connection controller unmounted");
    }
}

/// Replace a timer slot, cancelling whatever it held.
fn swap_timer(slot: &Mutex<Option<CancellationToken>>, next: Option<CancellationToken>) {
    let previous = match slot.lock() {
        Ok(mut guard) => std::mem::replace(&mut *guard, next),
        Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
    };
    if let Some(token) = previous {
        token.cancel();
    }
}

impl ControllerInner {
    fn patch(&self, patch: ConnectionPatch) {
        self.state.send_modify(|state| state.apply(&patch));
    }

    fn last_signals(&self) -> ProviderSignals {
        match self.signals.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn replace_signals(&self, next: ProviderSignals) -> ProviderSignals {
        match self.signals.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    /// Spawn `f` after `delay` on a child of the scope token.
    fn spawn_after<F>(self: &Arc<Self>, delay: Duration, token: CancellationToken, f: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        f(&inner);
                    }
                }
            }
        });
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    fn arm_connect_timeout(self: &Arc<Self>) {
        let token = self.scope.child_token();
        swap_timer(&self.connect_timer, Some(token.clone()));

        let timeout = self.config.connect_timeout;
        self.spawn_after(timeout, token, move |inner| inner.on_connect_timeout(timeout));
    }

    fn on_connect_timeout(self: &Arc<Self>, timeout: Duration) {
        if self.state.borrow().is_ready {
            return;
        }
        warn!(
            timeout_secs = timeout.as_secs(),
            "Wallet provider did not become ready in time"
        );
        self.patch(
            ConnectionPatch::new()
                .connecting(false)
                .error(format!(
                    "Connection timeout: wallet provider not ready after {}s",
                    timeout.as_secs()
                )),
        );
        if self.config.auto_retry {
            self.schedule_retry(self.config.auto_retry_delay);
        }
    }

    pub(super) fn observe(self: &Arc<Self>, signals: ProviderSignals) {
        if self.scope.is_cancelled() {
            return;
        }
        let previous = self.replace_signals(signals);
        debug!(
            ready = signals.ready,
            authenticated = signals.authenticated,
            "Provider signals observed"
        );

        if signals.ready {
            swap_timer(&self.connect_timer, None);
            let needs_ready = {
                let state = self.state.borrow();
                !state.is_ready || state.is_connecting
            };
            if needs_ready {
                info!("Wallet provider ready");
                self.patch(
                    ConnectionPatch::new()
                        .ready(true)
                        .connecting(false)
                        .clear_error(),
                );
            }
        } else if self.state.borrow().is_ready {
            self.patch(ConnectionPatch::new().ready(false));
        }

        if signals.is_session_live() {
            if !previous.is_session_live() {
                self.schedule_wallet_check();
            }
        } else {
            // A probe may only report while the session is live
            swap_timer(&self.wallet_check, None);
            if previous.authenticated && !signals.authenticated {
                // Logout
                let quality = match self.state.borrow().connection_quality {
                    ConnectionQuality::Failed => ConnectionQuality::Failed,
                    _ => ConnectionQuality::Poor,
                };
                self.patch(ConnectionPatch::new().wallet_ready(false).quality(quality));
            }
        }
    }

    // =========================================================================
    // Wallet check
    // =========================================================================

    fn schedule_wallet_check(self: &Arc<Self>) {
        let token = self.scope.child_token();
        swap_timer(&self.wallet_check, Some(token.clone()));

        let inner = Arc::clone(self);
        let settle = self.config.settle_delay;
        let probe_timeout = self.config.probe_timeout;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(settle) => {}
            }

            let probe = Arc::clone(&inner.deps.probe);
            let outcome = tokio::select! {
                _ = token.cancelled() => return,
                r = tokio::time::timeout(probe_timeout, probe.probe()) => r,
            };

            if token.is_cancelled() {
                return;
            }

            match outcome {
                Ok(Ok(())) => {
                    info!("Wallet probe succeeded");
                    inner.patch(
                        ConnectionPatch::new()
                            .wallet_ready(true)
                            .quality(ConnectionQuality::Good),
                    );
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Wallet probe failed");
                    inner.patch(
                        ConnectionPatch::new()
                            .wallet_ready(false)
                            .quality(ConnectionQuality::Poor),
                    );
                }
                Err(_) => {
                    warn!(
                        timeout_ms = probe_timeout.as_millis() as u64,
                        "Wallet probe timed out"
                    );
                    inner.patch(
                        ConnectionPatch::new()
                            .wallet_ready(false)
                            .quality(ConnectionQuality::Poor),
                    );
                }
            }
        });
    }

    // =========================================================================
    // Errors
    // =========================================================================

    fn handle_runtime_event(self: &Arc<Self>, event: &RuntimeEvent) -> bool {
        if self.scope.is_cancelled() {
            return false;
        }
        let Some(message) = event.wallet_failure() else {
            return false;
        };

        warn!(error = %message, "Wallet transport failure observed");
        // A probe finishing now would report stale health
        swap_timer(&self.wallet_check, None);
        self.patch(
            ConnectionPatch::new()
                .quality(ConnectionQuality::Failed)
                .wallet_ready(false)
                .error(message),
        );

        if self.config.auto_retry {
            self.schedule_retry(self.config.auto_retry_delay);
        }
        true
    }

    // =========================================================================
    // Retry
    // =========================================================================

    fn reset_patch() -> ConnectionPatch {
        ConnectionPatch::new()
            .connecting(true)
            .clear_error()
            .bump_retry()
    }

    fn reset(&self) {
        self.patch(Self::reset_patch());
    }

    fn retry(self: &Arc<Self>) -> RetryOutcome {
        if self.scope.is_cancelled() {
            return RetryOutcome::Exhausted;
        }

        let max = self.config.max_retries;
        let reset = Self::reset_patch();
        let exhausted = ConnectionPatch::new()
            .connecting(false)
            .error(MAX_RETRIES_MESSAGE);

        // Check-and-increment under the channel lock
        let mut attempt = None;
        self.state.send_modify(|state| {
            if state.retry_count >= max {
                state.apply(&exhausted);
            } else {
                state.apply(&reset);
                attempt = Some(state.retry_count);
            }
        });

        let Some(attempt) = attempt else {
            warn!(max_retries = max, "Retry budget exhausted");
            return RetryOutcome::Exhausted;
        };

        info!(attempt, max_retries = max, "Retrying wallet connection");

        if attempt >= self.config.purge_from_attempt {
            self.purge_wallet_keys();
            if let Err(e) = self.deps.session.clear() {
                warn!(error = %e, "Failed to clear session storage");
            }
        }

        if attempt >= max {
            info!(
                delay_ms = self.config.reload_delay.as_millis() as u64,
                "Scheduling environment reload"
            );
            let token = self.scope.child_token();
            self.spawn_after(self.config.reload_delay, token, |inner| {
                inner.deps.reloader.reload();
            });
            return RetryOutcome::ReloadScheduled { attempt };
        }

        self.resume();
        RetryOutcome::Retrying { attempt }
    }

    /// Re-evaluate readiness against the last observed signals.
    fn resume(self: &Arc<Self>) {
        swap_timer(&self.wallet_check, None);
        let signals = self.last_signals();

        if signals.ready {
            swap_timer(&self.connect_timer, None);
            self.patch(
                ConnectionPatch::new()
                    .ready(true)
                    .connecting(false)
                    .clear_error(),
            );
            if signals.authenticated {
                self.schedule_wallet_check();
            }
        } else {
            self.arm_connect_timeout();
        }
    }

    fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let token = self.scope.child_token();
        self.spawn_after(delay, token, |inner| {
            inner.retry();
        });
    }

    fn force_reconnect(self: &Arc<Self>) {
        if self.scope.is_cancelled() {
            return;
        }
        info!("Forcing wallet reconnect");
        swap_timer(&self.wallet_check, None);
        self.patch(
            ConnectionPatch::new()
                .wallet_ready(false)
                .quality(ConnectionQuality::Poor)
                .connecting(true)
                .clear_error(),
        );
        self.purge_wallet_keys();
        self.schedule_retry(self.config.force_reconnect_delay);
    }

    fn purge_wallet_keys(&self) {
        for key in [PRIVY_CONNECTIONS_KEY, PRIVY_WALLET_KEY] {
            if let Err(e) = self.deps.durable.remove(key) {
                warn!(key, error = %e, "Failed to purge persisted wallet key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::probe::ProbeError;
    use crate::storage::SessionStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe with a fixed latency and result.
    struct FakeProbe {
        delay: Duration,
        ok: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WalletProbe for FakeProbe {
        async fn probe(&self) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.ok {
                Ok(())
            } else {
                Err(ProbeError::Rpc("down".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct CountingReloader {
        reloads: AtomicUsize,
    }

    impl Reloader for CountingReloader {
        fn reload(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        controller: ConnectionController,
        durable: Arc<SessionStore>,
        session: Arc<SessionStore>,
        probe: Arc<FakeProbe>,
        reloader: Arc<CountingReloader>,
    }

    fn harness_with(config: ConnectionConfig, probe_ok: bool, probe_delay: Duration) -> Harness {
        let durable = Arc::new(SessionStore::new());
        let session = Arc::new(SessionStore::new());
        let probe = Arc::new(FakeProbe {
            delay: probe_delay,
            ok: probe_ok,
            calls: AtomicUsize::new(0),
        });
        let reloader = Arc::new(CountingReloader::default());

        let controller = ConnectionController::mount(
            config,
            ConnectionDeps {
                durable: durable.clone(),
                session: session.clone(),
                probe: probe.clone(),
                reloader: reloader.clone(),
            },
        );

        Harness {
            controller,
            durable,
            session,
            probe,
            reloader,
        }
    }

    fn harness() -> Harness {
        harness_with(ConnectionConfig::default(), true, Duration::from_millis(10))
    }

    fn seed_provider_keys(store: &SessionStore) {
        store.set(PRIVY_CONNECTIONS_KEY, "[]").unwrap();
        store.set(PRIVY_WALLET_KEY, "{}").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mount_enters_connecting() {
        let h = harness();
        let state = h.controller.state();
        assert!(state.is_connecting);
        assert!(!state.is_ready);
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_clears_timeout_and_error() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, false));

        let state = h.controller.state();
        assert!(state.is_ready);
        assert!(!state.is_connecting);
        assert!(!state.has_error);

        // The timeout must not fire afterwards
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!h.controller.state().has_error);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_sets_error() {
        let h = harness();
        tokio::time::sleep(Duration::from_secs(16)).await;

        let state = h.controller.state();
        assert!(state.has_error);
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .contains("Connection timeout"));
        assert!(!state.is_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_flag_tracks_latest_signal() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, false));
        assert!(h.controller.state().is_ready);
        h.controller.observe(ProviderSignals::new(false, false));
        assert!(!h.controller.state().is_ready);
        h.controller.observe(ProviderSignals::new(true, false));
        assert!(h.controller.state().is_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn wallet_probe_after_settle_delay() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, true));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
        assert!(!h.controller.state().is_wallet_ready);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = h.controller.state();
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);
        assert!(state.is_wallet_ready);
        assert_eq!(state.connection_quality, ConnectionQuality::Good);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out_as_poor() {
        let h = harness_with(ConnectionConfig::default(), true, Duration::from_secs(10));
        h.controller.observe(ProviderSignals::new(true, true));

        tokio::time::sleep(Duration::from_millis(4100)).await;
        let state = h.controller.state();
        assert!(!state.is_wallet_ready);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_is_poor() {
        let h = harness_with(ConnectionConfig::default(), false, Duration::from_millis(5));
        h.controller.observe(ProviderSignals::new(true, true));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = h.controller.state();
        assert!(!state.is_wallet_ready);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_drops_wallet_readiness() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, true));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h.controller.state().is_wallet_ready);

        h.controller.observe(ProviderSignals::new(true, false));
        let state = h.controller.state();
        assert!(!state.is_wallet_ready);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn losing_readiness_cancels_in_flight_wallet_check() {
        let h = harness_with(ConnectionConfig::default(), true, Duration::from_millis(50));
        h.controller.observe(ProviderSignals::new(true, true));

        // Settle delay elapsed, check still running
        tokio::time::sleep(Duration::from_millis(1020)).await;
        assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);

        h.controller.observe(ProviderSignals::new(false, true));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = h.controller.state();
        assert!(!state.is_ready);
        assert!(!state.is_wallet_ready);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn recognised_error_event_fails_connection() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, true));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h.controller.state().is_wallet_ready);

        let recognised = h
            .controller
            .handle_runtime_event(&RuntimeEvent::error("Unable to connect to wallet"));
        assert!(recognised);

        let state = h.controller.state();
        assert_eq!(state.connection_quality, ConnectionQuality::Failed);
        assert!(!state.is_wallet_ready);
        assert!(state.has_error);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Unable to connect to wallet")
        );
        // No retry was triggered
        assert_eq!(state.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognised_error_event_is_ignored() {
        let h = harness();
        let before = h.controller.state();
        assert!(!h
            .controller
            .handle_runtime_event(&RuntimeEvent::error("TypeError: a is undefined")));
        assert_eq!(h.controller.state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn third_retry_purges_provider_keys() {
        let h = harness();
        seed_provider_keys(&h.durable);
        h.session.set("privy:session", "x").unwrap();

        assert_eq!(h.controller.retry(), RetryOutcome::Retrying { attempt: 1 });
        assert_eq!(h.controller.retry(), RetryOutcome::Retrying { attempt: 2 });
        assert!(h.durable.get(PRIVY_WALLET_KEY).unwrap().is_some());

        assert_eq!(h.controller.retry(), RetryOutcome::Retrying { attempt: 3 });
        assert!(h.durable.get(PRIVY_CONNECTIONS_KEY).unwrap().is_none());
        assert!(h.durable.get(PRIVY_WALLET_KEY).unwrap().is_none());
        assert!(h.session.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fifth_retry_schedules_reload() {
        let h = harness();
        for attempt in 1..=4 {
            assert_eq!(h.controller.retry(), RetryOutcome::Retrying { attempt });
        }
        assert_eq!(
            h.controller.retry(),
            RetryOutcome::ReloadScheduled { attempt: 5 }
        );
        assert_eq!(h.reloader.reloads.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.reloader.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_retry_is_terminal_without_storage_mutation() {
        let h = harness();
        for _ in 0..5 {
            h.controller.retry();
        }
        seed_provider_keys(&h.durable);

        assert_eq!(h.controller.retry(), RetryOutcome::Exhausted);

        let state = h.controller.state();
        assert_eq!(state.retry_count, 5);
        assert!(state.has_error);
        assert_eq!(state.error_message.as_deref(), Some(MAX_RETRIES_MESSAGE));
        assert!(h.durable.get(PRIVY_CONNECTIONS_KEY).unwrap().is_some());
        assert!(h.durable.get(PRIVY_WALLET_KEY).unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_resumes_when_provider_already_ready() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, false));
        h.controller
            .handle_runtime_event(&RuntimeEvent::error("iframe unavailable"));
        assert!(h.controller.state().has_error);

        h.controller.retry();
        let state = h.controller.state();
        assert!(!state.has_error);
        assert!(!state.is_connecting);
        assert!(state.is_ready);
        assert_eq!(state.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn force_reconnect_purges_then_retries() {
        let h = harness();
        h.controller.observe(ProviderSignals::new(true, true));
        tokio::time::sleep(Duration::from_secs(2)).await;
        seed_provider_keys(&h.durable);

        h.controller.force_reconnect();

        let state = h.controller.state();
        assert!(!state.is_wallet_ready);
        assert!(state.is_connecting);
        assert_eq!(state.connection_quality, ConnectionQuality::Poor);
        assert!(h.durable.get(PRIVY_WALLET_KEY).unwrap().is_none());
        assert_eq!(state.retry_count, 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.controller.state().retry_count, 1);

        // Resumed retry re-probes the wallet
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h.controller.state().is_wallet_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_retry_follows_transport_error() {
        let config = ConnectionConfig {
            auto_retry: true,
            ..Default::default()
        };
        let h = harness_with(config, true, Duration::from_millis(5));
        h.controller.observe(ProviderSignals::new(true, false));
        h.controller
            .handle_runtime_event(&RuntimeEvent::error("postMessage failed"));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let state = h.controller.state();
        assert_eq!(state.retry_count, 1);
        assert!(!state.has_error);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_do_not_fire_after_unmount() {
        let h = harness();
        let rx = h.controller.subscribe();
        h.controller.observe(ProviderSignals::new(true, true));
        for _ in 0..4 {
            h.controller.retry();
        }
        h.controller.retry();

        let Harness {
            controller,
            reloader,
            probe,
            ..
        } = h;
        controller.unmount();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(reloader.reloads.load(Ordering::SeqCst), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert!(!rx.borrow().is_wallet_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_bumps_counter_and_clears_error() {
        let h = harness();
        h.controller
            .handle_runtime_event(&RuntimeEvent::error("Unable to connect to wallet"));
        h.controller.reset();

        let state = h.controller.state();
        assert_eq!(state.retry_count, 1);
        assert!(state.is_connecting);
        assert!(!state.has_error);
        assert!(state.error_message.is_none());
        // Quality stays failed until the wallet is probed again
        assert_eq!(state.connection_quality, ConnectionQuality::Failed);
    }
    #[tokio::test(start_paused = true)]
    async fn retry_applies_the_same_reset_as_reset() {
        let reset = harness();
        let retried = harness();
        for h in [&reset, &retried] {
            h.controller
                .handle_runtime_event(&RuntimeEvent::error("Unable to connect to wallet"));
        }

        reset.controller.reset();
        assert_eq!(retried.controller.retry(), RetryOutcome::Retrying { attempt: 1 });

        // Provider not ready, so resuming only re-arms the connect timeout
        assert_eq!(retried.controller.state(), reset.controller.state());
    }
}
