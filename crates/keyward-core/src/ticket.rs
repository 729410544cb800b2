//! Sealed credential bodies.
//!
//! These are the plaintexts inside the envelopes the KDC and client produce.
//! None of them ever crosses the wire unsealed.
//!
//! ```text
//! KEY_RESPONSE.encrypted_client_package = seal(client master key, CredentialPackage)
//!     CredentialPackage.ticket          = seal(server master key, TicketBody)
//! AUTH.authenticator                    = seal(session keys, Authenticator)
//! ```

use keyward_crypto::{Envelope, Scheme, SessionKeySet};
use serde::{Deserialize, Serialize};

/// Ticket contents, readable only by the server it names.
///
/// Binds the session keys to a (client, server) pair and a validity window.
/// The scheme is pinned here so the server never trusts a scheme claimed by
/// the client alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketBody {
    /// Client the ticket was issued to
    pub client_id: String,
    /// Server the ticket is valid for
    pub server_id: String,
    /// Issue time (Unix seconds, KDC clock)
    pub issued_at: u64,
    /// Expiry time (Unix seconds, KDC clock)
    pub expiry: u64,
    /// Envelope scheme for the whole session
    pub scheme: Scheme,
    /// Session keys shared with the client
    pub keys: SessionKeySet,
}

impl TicketBody {
    /// Whether the ticket has expired at `now`.
    ///
    /// The expiry second itself is still valid.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expiry
    }
}

/// Client-side credentials as issued by the KDC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPackage {
    /// Issue time (Unix seconds, KDC clock)
    pub issued_at: u64,
    /// Expiry time, identical to the ticket's
    pub expiry: u64,
    /// Envelope scheme pinned in the ticket
    pub scheme: Scheme,
    /// Session keys, identical to the ticket's
    pub keys: SessionKeySet,
    /// Ticket sealed for the server, forwarded verbatim in AUTH
    pub ticket: Envelope,
}

/// Proof that the AUTH sender holds the session keys right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    /// Claimed client identity, must match the ticket
    pub client_id: String,
    /// Creation time (Unix seconds, client clock)
    pub timestamp: u64,
    /// Scheme the client believes is pinned
    pub scheme: Scheme,
}

impl Authenticator {
    /// Whether `timestamp` is within `max_skew_secs` of `now`, either side.
    pub fn is_fresh_at(&self, now: u64, max_skew_secs: u64) -> bool {
        now.abs_diff(self.timestamp) <= max_skew_secs
    }
}

#[cfg(test)]
mod tests {
    use keyward_crypto::{SEAL_RANDOM_SIZE, SESSION_KEY_MATERIAL_SIZE, seal_payload};

    use super::*;

    fn ticket(expiry: u64) -> TicketBody {
        TicketBody {
            client_id: "C1".into(),
            server_id: "S1".into(),
            issued_at: expiry - 300,
            expiry,
            scheme: Scheme::Aead,
            keys: SessionKeySet::from_random([3; SESSION_KEY_MATERIAL_SIZE]),
        }
    }

    #[test]
    fn expiry_second_is_inclusive() {
        let t = ticket(1_000);
        assert!(!t.is_expired_at(999));
        assert!(!t.is_expired_at(1_000));
        assert!(t.is_expired_at(1_001));
    }

    #[test]
    fn freshness_is_symmetric() {
        let auth = Authenticator { client_id: "C1".into(), timestamp: 1_000, scheme: Scheme::Aead };

        assert!(auth.is_fresh_at(970, 30));
        assert!(auth.is_fresh_at(1_030, 30));
        assert!(!auth.is_fresh_at(969, 30));
        assert!(!auth.is_fresh_at(1_031, 30));
    }

    #[test]
    fn ticket_survives_sealing() {
        let t = ticket(5_000);
        let sealer = SessionKeySet::from_random([9; SESSION_KEY_MATERIAL_SIZE]);
        let sealed = seal_payload(Scheme::Aead, &sealer, &t, [0; SEAL_RANDOM_SIZE]).unwrap();

        let opened: TicketBody = keyward_crypto::open_payload(&sealer, &sealed).unwrap();
        assert_eq!(opened, t);
    }
}
