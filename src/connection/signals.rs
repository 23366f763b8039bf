// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider signal feed.
//!
//! Consumes a `watch` channel of provider snapshots and forwards the
//! `ready`/`authenticated` pair to the controller. Changes to
//! `authenticated` (login, logout) are forwarded immediately; any other
//! change is coalesced over a short debounce window.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::controller::ConnectionController;
use super::provider::ProviderSnapshot;

/// Coalescing window for non-authentication signal changes.
pub const SIGNAL_DEBOUNCE: Duration = Duration::from_millis(10);

/// Spawn the feed. It stops when the controller unmounts or the sender is
/// dropped.
pub fn spawn_signal_feed(
    controller: &ConnectionController,
    mut rx: watch::Receiver<ProviderSnapshot>,
) -> JoinHandle<()> {
    let inner = controller.inner.clone();
    let scope = inner.scope.clone();

    tokio::spawn(async move {
        let mut applied = rx.borrow_and_update().signals();
        inner.observe(applied);

        loop {
            tokio::select! {
                _ = scope.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }

            let mut latest = rx.borrow_and_update().signals();

            if latest.authenticated == applied.authenticated {
                let debounce = tokio::time::sleep(SIGNAL_DEBOUNCE);
                tokio::pin!(debounce);

                loop {
                    tokio::select! {
                        _ = scope.cancelled() => return,
                        _ = &mut debounce => break,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            latest = rx.borrow_and_update().signals();
                            if latest.authenticated != applied.authenticated {
                                break;
                            }
                        }
                    }
                }
            }

            if latest != applied {
                inner.observe(latest);
                applied = latest;
            }
        }
    })
}
