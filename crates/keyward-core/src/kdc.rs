//! Key distribution center.
//!
//! Pure request/response logic: one `KEY_REQUEST` in, one `KEY_RESPONSE` or
//! `ERROR` out. Time and randomness come from the [`Environment`], so the
//! same code runs under the production runtime and the simulator.
//!
//! # Issuance
//!
//! ```text
//! keys    = SessionKeySet::from_random(env)
//! ticket  = seal(server_key, TicketBody { client, server, window, scheme, keys })
//! package = seal(client_key, CredentialPackage { window, scheme, keys, ticket })
//! ```
//!
//! The KDC keeps no state between requests. Session keys are dropped (and
//! zeroized) as soon as the response is built.

use std::sync::Arc;

use keyward_crypto::{SEAL_RANDOM_SIZE, SESSION_KEY_MATERIAL_SIZE, Scheme, SessionKeySet};
use keyward_proto::{KeyRequest, KeyResponse, Message};

use crate::{
    config::KdcConfig,
    env::Environment,
    error::KdcError,
    ticket::{CredentialPackage, TicketBody},
};

/// Ticket-issuing service.
///
/// Cheap to clone: the configuration is shared.
#[derive(Debug, Clone)]
pub struct Kdc<E: Environment> {
    config: Arc<KdcConfig>,
    env: E,
}

impl<E: Environment> Kdc<E> {
    /// Create a KDC from its configuration.
    pub fn new(config: KdcConfig, env: E) -> Self {
        Self { config: Arc::new(config), env }
    }

    /// Shared configuration.
    pub fn config(&self) -> &KdcConfig {
        &self.config
    }

    /// Answer one request.
    ///
    /// Never fails: every rejection becomes an `ERROR` message.
    pub fn handle_request(&self, message: &Message) -> Message {
        let Message::KeyRequest(request) = message else {
            tracing::warn!(
                kind = "protocol_violation",
                message_type = message.type_name(),
                "KDC rejected non-request message"
            );
            return Message::Error(
                KdcError::ProtocolViolation(format!(
                    "expected KEY_REQUEST, got {}",
                    message.type_name()
                ))
                .to_error_payload(),
            );
        };

        match self.issue(request) {
            Ok(response) => Message::KeyResponse(response),
            Err(err) => {
                tracing::warn!(
                    client_id = %request.client_id,
                    server_id = %request.server_id,
                    scheme = %request.scheme,
                    error = %err,
                    "KDC rejected key request"
                );
                Message::Error(err.to_error_payload())
            },
        }
    }

    /// Validate a request and issue credentials.
    ///
    /// # Errors
    ///
    /// - `KdcError::UnknownScheme` if the scheme name is not supported
    /// - `KdcError::UnknownPrincipal` if the server is not this KDC's server
    /// - `KdcError::ProtocolViolation` if the client id is empty
    /// - `KdcError::Internal` if sealing fails
    pub fn issue(&self, request: &KeyRequest) -> Result<KeyResponse, KdcError> {
        let scheme: Scheme = request
            .scheme
            .parse()
            .map_err(|_| KdcError::UnknownScheme(request.scheme.clone()))?;

        if request.server_id != self.config.server_id {
            return Err(KdcError::UnknownPrincipal(request.server_id.clone()));
        }

        if request.client_id.is_empty() {
            return Err(KdcError::ProtocolViolation("client_id must not be empty".to_string()));
        }

        let issued_at = self.env.wall_clock_secs();
        let expiry = issued_at.saturating_add(self.config.ticket_lifetime.as_secs());
        let keys = SessionKeySet::from_random(self.env.random_array::<SESSION_KEY_MATERIAL_SIZE>());

        let ticket = TicketBody {
            client_id: request.client_id.clone(),
            server_id: request.server_id.clone(),
            issued_at,
            expiry,
            scheme,
            keys: keys.clone(),
        };
        let sealed_ticket =
            self.config.server_key.seal(&ticket, self.env.random_array::<SEAL_RANDOM_SIZE>())?;

        let package = CredentialPackage { issued_at, expiry, scheme, keys, ticket: sealed_ticket };
        let sealed_package =
            self.config.client_key.seal(&package, self.env.random_array::<SEAL_RANDOM_SIZE>())?;

        tracing::info!(
            client_id = %request.client_id,
            server_id = %request.server_id,
            %scheme,
            expiry,
            "issued ticket"
        );

        Ok(KeyResponse { encrypted_client_package: sealed_package })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU8, Ordering},
        },
        time::Duration,
    };

    use keyward_crypto::MasterKey;
    use keyward_proto::ErrorPayload;

    use super::*;

    #[derive(Clone, Default)]
    struct TestEnv {
        counter: Arc<AtomicU8>,
    }

    impl Environment for TestEnv {
        fn wall_clock_secs(&self) -> u64 {
            1_700_000_000
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // Distinct bytes per call so nonces never repeat
            let call = self.counter.fetch_add(1, Ordering::Relaxed);
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = (i as u8).wrapping_add(call.wrapping_mul(31));
            }
        }
    }

    fn client_key() -> MasterKey {
        MasterKey::from_passphrase("client")
    }

    fn server_key() -> MasterKey {
        MasterKey::from_passphrase("server")
    }

    fn kdc() -> Kdc<TestEnv> {
        Kdc::new(KdcConfig::new(client_key(), server_key(), "S1"), TestEnv::default())
    }

    fn request(client_id: &str, server_id: &str, scheme: &str) -> Message {
        Message::KeyRequest(KeyRequest {
            client_id: client_id.into(),
            server_id: server_id.into(),
            scheme: scheme.into(),
        })
    }

    fn error_code(reply: &Message) -> u16 {
        match reply {
            Message::Error(payload) => payload.code,
            other => panic!("expected ERROR, got {other:?}"),
        }
    }

    #[test]
    fn issues_package_and_ticket_with_shared_keys() {
        let reply = kdc().handle_request(&request("C1", "S1", "AEAD"));
        let Message::KeyResponse(response) = reply else {
            panic!("expected KEY_RESPONSE, got {reply:?}");
        };

        let package: CredentialPackage =
            client_key().open(&response.encrypted_client_package).unwrap();
        let ticket: TicketBody = server_key().open(&package.ticket).unwrap();

        assert_eq!(ticket.client_id, "C1");
        assert_eq!(ticket.server_id, "S1");
        assert_eq!(ticket.scheme, Scheme::Aead);
        assert_eq!(package.scheme, Scheme::Aead);
        assert_eq!(package.keys, ticket.keys);
        assert_eq!(ticket.issued_at, 1_700_000_000);
        assert_eq!(ticket.expiry, 1_700_000_300);
        assert_eq!(package.expiry, ticket.expiry);
    }

    #[test]
    fn ticket_is_opaque_to_the_client() {
        let Message::KeyResponse(response) = kdc().handle_request(&request("C1", "S1", "AEAD"))
        else {
            panic!("expected KEY_RESPONSE");
        };
        let package: CredentialPackage =
            client_key().open(&response.encrypted_client_package).unwrap();

        let result: Result<TicketBody, _> = client_key().open(&package.ticket);
        assert!(result.is_err());
    }

    #[test]
    fn scheme_names_are_case_insensitive() {
        let reply = kdc().handle_request(&request("C1", "S1", "mac_then_encrypt"));
        assert!(matches!(reply, Message::KeyResponse(_)));
    }

    #[test]
    fn each_request_mints_fresh_keys() {
        let kdc = kdc();
        let open = |reply: Message| -> CredentialPackage {
            let Message::KeyResponse(response) = reply else {
                panic!("expected KEY_RESPONSE");
            };
            client_key().open(&response.encrypted_client_package).unwrap()
        };

        let a = open(kdc.handle_request(&request("C1", "S1", "AEAD")));
        let b = open(kdc.handle_request(&request("C1", "S1", "AEAD")));
        assert_ne!(a.keys, b.keys);
    }

    #[test]
    fn custom_lifetime_sets_expiry() {
        let config = KdcConfig::new(client_key(), server_key(), "S1")
            .with_ticket_lifetime(Duration::from_secs(60));
        let kdc = Kdc::new(config, TestEnv::default());

        let Ok(response) = kdc.issue(&KeyRequest {
            client_id: "C1".into(),
            server_id: "S1".into(),
            scheme: "AEAD".into(),
        }) else {
            panic!("issue should succeed");
        };
        let package: CredentialPackage =
            client_key().open(&response.encrypted_client_package).unwrap();
        assert_eq!(package.expiry - package.issued_at, 60);
    }

    #[test]
    fn rejects_non_request_messages() {
        let reply = kdc().handle_request(&Message::Bye);
        assert_eq!(error_code(&reply), ErrorPayload::PROTOCOL_VIOLATION);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let reply = kdc().handle_request(&request("C1", "S1", "DES"));
        assert_eq!(error_code(&reply), ErrorPayload::UNKNOWN_SCHEME);
    }

    #[test]
    fn rejects_unknown_server() {
        let reply = kdc().handle_request(&request("C1", "S2", "AEAD"));
        assert_eq!(error_code(&reply), ErrorPayload::UNKNOWN_PRINCIPAL);
    }

    #[test]
    fn rejects_empty_client_id() {
        let reply = kdc().handle_request(&request("", "S1", "AEAD"));
        assert_eq!(error_code(&reply), ErrorPayload::PROTOCOL_VIOLATION);
    }

    #[test]
    fn scheme_is_checked_before_principal() {
        let reply = kdc().handle_request(&request("C1", "S2", "ROT13"));
        assert_eq!(error_code(&reply), ErrorPayload::UNKNOWN_SCHEME);
    }
}
