use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::TypesError;

/// SIP digest credentials as stored by the HSS.
///
/// `qop` defaults to `"auth"` when the HSS (or the provisioning store)
/// leaves it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestAuthVector {
    pub ha1: String,
    pub realm: String,
    pub qop: String,
}

impl DigestAuthVector {
    pub fn new(ha1: String, realm: String, qop: Option<String>) -> Self {
        let qop = match qop {
            Some(q) if !q.is_empty() => q,
            _ => "auth".to_string(),
        };
        Self { ha1, realm, qop }
    }
}

/// AKA challenge material, transport-encoded for the control plane: the
/// challenge is base64, everything else lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AkaAuthVector {
    pub version: u8,
    pub challenge: String,
    pub response: String,
    pub crypt_key: String,
    pub integrity_key: String,
}

impl AkaAuthVector {
    /// Encode raw HSS-supplied octets into the transport form.
    pub fn from_raw(
        version: u8,
        challenge: &[u8],
        response: &[u8],
        crypt_key: &[u8],
        integrity_key: &[u8],
    ) -> Self {
        Self {
            version,
            challenge: BASE64.encode(challenge),
            response: hex::encode(response),
            crypt_key: hex::encode(crypt_key),
            integrity_key: hex::encode(integrity_key),
        }
    }

    pub fn decode_challenge(&self) -> Result<Vec<u8>, TypesError> {
        BASE64
            .decode(&self.challenge)
            .map_err(|e| TypesError::Encoding(format!("challenge: {e}")))
    }

    pub fn decode_response(&self) -> Result<Vec<u8>, TypesError> {
        hex::decode(&self.response).map_err(|e| TypesError::Encoding(format!("response: {e}")))
    }

    pub fn decode_crypt_key(&self) -> Result<Vec<u8>, TypesError> {
        hex::decode(&self.crypt_key).map_err(|e| TypesError::Encoding(format!("crypt_key: {e}")))
    }

    pub fn decode_integrity_key(&self) -> Result<Vec<u8>, TypesError> {
        hex::decode(&self.integrity_key)
            .map_err(|e| TypesError::Encoding(format!("integrity_key: {e}")))
    }
}

/// An authentication vector returned on the multimedia-auth path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthVector {
    Digest(DigestAuthVector),
    Aka(AkaAuthVector),
}

impl AuthVector {
    pub fn as_digest(&self) -> Option<&DigestAuthVector> {
        match self {
            AuthVector::Digest(d) => Some(d),
            AuthVector::Aka(_) => None,
        }
    }

    pub fn as_aka(&self) -> Option<&AkaAuthVector> {
        match self {
            AuthVector::Aka(a) => Some(a),
            AuthVector::Digest(_) => None,
        }
    }
}
