//! API key rotation under per-key daily quotas.
//!
//! Every key starts `Available` with a usage counter; a key moves to
//! `Exhausted` when the provider reports quota exhaustion or when the locally
//! recorded usage reaches the daily budget. There is no way back within the
//! process lifetime: quotas reset on the provider's daily cycle.

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub const DEFAULT_QUOTA_LIMIT: u64 = 10_000;

/// Cost of one `search.list` call in the provider's cost model.
pub const SEARCH_COST: u64 = 100;

/// Usage recorded for exhausted keys; never the minimum while another key is usable.
const EXHAUSTED_USAGE: u64 = u64::MAX;

/// Handle to a rotator-owned key, as handed out by [`CredentialRotator::select`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    token: String,
    label: String,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Log-safe identifier (hash prefix of the token).
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("label", &self.label)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyState {
    Available { usage: u64 },
    Exhausted,
}

impl KeyState {
    fn usage(self) -> u64 {
        match self {
            KeyState::Available { usage } => usage,
            KeyState::Exhausted => EXHAUSTED_USAGE,
        }
    }
}

#[derive(Debug)]
struct KeySlot {
    token: String,
    label: String,
    state: KeyState,
}

/// Point-in-time view of one key (for `/status`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialStatus {
    pub label: String,
    pub usage: u64,
    pub exhausted: bool,
}

#[derive(Debug)]
pub struct CredentialRotator {
    quota_limit: u64,
    slots: Mutex<Vec<KeySlot>>,
}

impl CredentialRotator {
    pub fn new(tokens: impl IntoIterator<Item = String>, quota_limit: u64) -> Self {
        let slots = tokens
            .into_iter()
            .map(|token| KeySlot {
                label: key_label(&token),
                token,
                state: KeyState::Available { usage: 0 },
            })
            .collect();

        Self {
            quota_limit,
            slots: Mutex::new(slots),
        }
    }

    /// Number of registered keys, usable or not.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Pick the available key with the lowest recorded usage.
    ///
    /// Ties go to the earliest registered key. `None` means every key is
    /// exhausted; callers must stop the current request rather than retry.
    pub async fn select(&self) -> Option<Credential> {
        let slots = self.slots.lock().await;
        let (index, slot) = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.state, KeyState::Available { .. }))
            .min_by_key(|(i, s)| (s.state.usage(), *i))?;

        Some(Credential {
            index,
            token: slot.token.clone(),
            label: slot.label.clone(),
        })
    }

    /// Add `cost` units to the key's usage.
    ///
    /// Reaching the daily budget exhausts the key without waiting for the
    /// provider to refuse a call.
    pub async fn record_usage(&self, credential: &Credential, cost: u64) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(credential.index) else {
            return;
        };
        if let KeyState::Available { usage } = slot.state {
            let usage = usage.saturating_add(cost);
            if usage >= self.quota_limit {
                tracing::warn!(key = %slot.label, usage, "API key reached its daily budget");
                slot.state = KeyState::Exhausted;
            } else {
                slot.state = KeyState::Available { usage };
            }
        }
    }

    /// The provider refused the key for quota reasons.
    pub async fn mark_exhausted(&self, credential: &Credential) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(credential.index) else {
            return;
        };
        if slot.state != KeyState::Exhausted {
            tracing::warn!(key = %slot.label, "quota exceeded for API key, rotating");
            slot.state = KeyState::Exhausted;
        }
        let remaining = slots
            .iter()
            .filter(|s| s.state != KeyState::Exhausted)
            .count();
        if remaining == 0 {
            tracing::error!("all API keys exhausted");
        }
    }

    pub async fn statuses(&self) -> Vec<CredentialStatus> {
        self.slots
            .lock()
            .await
            .iter()
            .map(|s| CredentialStatus {
                label: s.label.clone(),
                usage: match s.state {
                    KeyState::Available { usage } => usage,
                    KeyState::Exhausted => self.quota_limit,
                },
                exhausted: s.state == KeyState::Exhausted,
            })
            .collect()
    }
}

fn key_label(token: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(8);
    for b in digest.iter().take(4) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
