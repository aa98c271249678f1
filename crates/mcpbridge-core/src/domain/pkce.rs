//! PKCE (RFC 7636) challenge verification

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Code challenge transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    S256,
    Plain,
}

impl PkceMethod {
    /// Parse the `code_challenge_method` parameter (absent means S256)
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.unwrap_or("S256") {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// Challenge recorded at /authorize, checked at /token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    pub challenge: String,
    pub method: PkceMethod,
}

impl PkceChallenge {
    pub fn new(challenge: impl Into<String>, method: PkceMethod) -> Self {
        Self {
            challenge: challenge.into(),
            method,
        }
    }

    pub fn verify(&self, code_verifier: &str) -> bool {
        match self.method {
            PkceMethod::S256 => {
                let hash = Sha256::digest(code_verifier.as_bytes());
                URL_SAFE_NO_PAD.encode(hash) == self.challenge
            }
            PkceMethod::Plain => code_verifier == self.challenge,
        }
    }
}
