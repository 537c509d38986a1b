//! Single source of truth for one wizard session.
//!
//! [`WizardStateStore`] wraps a `tokio::sync::watch` channel: updates are
//! shallow merges of a [`WizardPatch`] into the current snapshot, and every
//! subscriber observes the new snapshot. There is no validation here.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::domain::{WizardData, WizardPatch};

/// Holds the mutable [`WizardData`] of one protocol in progress.
#[derive(Debug)]
pub struct WizardStateStore {
    tx: watch::Sender<WizardData>,
    version: AtomicU64,
}

impl Default for WizardStateStore {
    fn default() -> Self {
        Self::new(WizardData::default())
    }
}

impl WizardStateStore {
    pub fn new(initial: WizardData) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            version: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current data.
    pub fn data(&self) -> WizardData {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current data without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&WizardData) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Shallow-merge `patch` and notify subscribers.
    pub fn update(&self, patch: WizardPatch) {
        self.tx.send_modify(|data| patch.apply_to(data));
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    /// Build a patch from the current snapshot and apply it atomically.
    pub fn update_with(&self, f: impl FnOnce(&WizardData) -> WizardPatch) {
        self.tx.send_modify(|data| {
            let patch = f(data);
            patch.apply_to(data);
        });
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    /// Restore the initial empty wizard.
    pub fn reset(&self) {
        self.tx.send_replace(WizardData::default());
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    /// Receiver that observes every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WizardData> {
        self.tx.subscribe()
    }

    /// Number of updates applied so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }
}
