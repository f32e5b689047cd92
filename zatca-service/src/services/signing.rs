//! Document signing seam.
//!
//! ZATCA production requires XAdES signatures backed by a CSID certificate.
//! Until that is wired in, invoices either go out unsigned ([`NullSigner`])
//! or carry a detached Ed25519 signature ([`Ed25519Signer`]).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

use crate::models::CanonicalDocument;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// A document ready to leave the service.
#[derive(Debug, Clone)]
pub struct SignedInvoice {
    pub document: CanonicalDocument,
    /// Base64 SHA-256 of the XML bytes.
    pub digest: String,
    /// Base64 detached signature, when a real signer is configured.
    pub signature: Option<String>,
    pub signer: &'static str,
}

pub trait InvoiceSigner: Send + Sync {
    fn sign(&self, document: CanonicalDocument) -> Result<SignedInvoice, SigningError>;
}

fn xml_digest(xml: &str) -> String {
    STANDARD.encode(Sha256::digest(xml.as_bytes()))
}

/// Passes documents through untouched.
#[derive(Debug, Clone, Default)]
pub struct NullSigner;

impl InvoiceSigner for NullSigner {
    fn sign(&self, document: CanonicalDocument) -> Result<SignedInvoice, SigningError> {
        tracing::debug!(uuid = %document.uuid, "No signer configured, sending unsigned document");
        Ok(SignedInvoice {
            digest: xml_digest(&document.xml),
            document,
            signature: None,
            signer: "none",
        })
    }
}

pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// `seed` is a base64 encoded 32 byte Ed25519 secret key.
    pub fn from_base64_seed(seed: &Secret<String>) -> Result<Self, SigningError> {
        let bytes = STANDARD
            .decode(seed.expose_secret().trim())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

impl InvoiceSigner for Ed25519Signer {
    fn sign(&self, document: CanonicalDocument) -> Result<SignedInvoice, SigningError> {
        let signature = self.key.sign(document.xml.as_bytes());
        Ok(SignedInvoice {
            digest: xml_digest(&document.xml),
            signature: Some(STANDARD.encode(signature.to_bytes())),
            document,
            signer: "ed25519",
        })
    }
}

/// Pick the signer for the configured key, falling back to [`NullSigner`].
pub fn signer_from_config(
    seed: Option<&Secret<String>>,
) -> Result<Arc<dyn InvoiceSigner>, SigningError> {
    match seed {
        Some(seed) => {
            let signer = Ed25519Signer::from_base64_seed(seed)?;
            tracing::info!("Ed25519 invoice signing enabled");
            Ok(Arc::new(signer))
        }
        None => {
            tracing::warn!("ZATCA_SIGNING_KEY not set - invoices will be submitted unsigned");
            Ok(Arc::new(NullSigner))
        }
    }
}
