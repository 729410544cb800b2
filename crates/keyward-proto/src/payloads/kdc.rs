//! Key distribution payloads.

use keyward_crypto::Envelope;
use serde::{Deserialize, Serialize};

/// Client request for a ticket to `server_id`.
///
/// `scheme` stays a string on the wire. The KDC validates it into a
/// `Scheme` and answers `UNKNOWN_SCHEME` for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    /// Requesting client identity
    pub client_id: String,
    /// Server the client wants to talk to
    pub server_id: String,
    /// Requested envelope scheme name (e.g. `"AEAD"`)
    pub scheme: String,
}

/// KDC reply carrying the client's credential package.
///
/// The package is sealed under the client's master key and embeds the ticket,
/// which is in turn sealed under the server's master key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResponse {
    /// Credential package sealed for the client
    pub encrypted_client_package: Envelope,
}
