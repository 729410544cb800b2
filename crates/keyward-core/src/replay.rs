//! Authenticator replay detection.
//!
//! A captured AUTH stays valid for as long as its authenticator is fresh.
//! The [`ReplayGuard`] remembers every accepted `(client_id, timestamp,
//! ticket)` triple until the skew window has moved past its timestamp, so the
//! same AUTH is accepted at most once. One guard is shared by every session
//! behind a listener.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use keyward_crypto::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeenAuth {
    client_id: String,
    timestamp: u64,
    ticket: [u8; 32],
}

/// Shared record of accepted authenticators.
///
/// Cloning yields a handle to the same record.
#[derive(Debug, Clone, Default)]
pub struct ReplayGuard {
    seen: Arc<Mutex<HashMap<SeenAuth, u64>>>,
}

impl ReplayGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authenticator, returning `false` if it was already accepted.
    ///
    /// Entries whose timestamp is more than `max_skew` seconds behind `now`
    /// are pruned first. Such an authenticator fails the freshness check on
    /// its own, so forgetting it reopens nothing.
    pub fn check_and_record(
        &self,
        client_id: &str,
        timestamp: u64,
        ticket: &Envelope,
        now: u64,
        max_skew: u64,
    ) -> bool {
        let key =
            SeenAuth { client_id: client_id.to_string(), timestamp, ticket: ticket.fingerprint() };

        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, ts| ts.saturating_add(max_skew) >= now);
        seen.insert(key, timestamp).is_none()
    }

    /// Number of authenticators currently remembered.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
