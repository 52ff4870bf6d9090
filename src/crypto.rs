//! Cryptographic primitives for fedchain

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// SHA-256 digest used for transaction, block and asset identities.
pub type Hash = [u8; 32];

/// SHA-256 of a compressed public key.
pub type Address = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("public key must be exactly {} bytes (compressed), got {0}", PUBLIC_KEY_SIZE)]
    PublicKeyLength(usize),

    #[error("signature must be exactly {} bytes (compact), got {0}", COMPACT_SIGNATURE_SIZE)]
    SignatureLength(usize),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    VerificationFailed,
}

pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Address of a serialized public key. Does not check that the bytes are a valid point.
pub fn address_of(public_key_bytes: &[u8]) -> Address {
    sha256(public_key_bytes)
}

/// Parses a compressed secp256k1 public key.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_SIZE {
        return Err(CryptoError::PublicKeyLength(bytes.len()));
    }
    PublicKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Decodes a hex-encoded compressed public key, returning its bytes.
pub fn public_key_from_hex(hex_str: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = hex::decode(hex_str).map_err(|e| CryptoError::InvalidKey(format!("invalid hex: {}", e)))?;
    parse_public_key(&bytes)?;
    Ok(bytes)
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn address(&self) -> Address {
        address_of(&self.public_key_bytes())
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Signs a message (which is first hashed using SHA-256) and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; COMPACT_SIGNATURE_SIZE] {
        let message = Message::from_digest(sha256(message));
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), CryptoError> {
    let public_key = parse_public_key(public_key_bytes)?;
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(CryptoError::SignatureLength(signature_bytes.len()));
    }

    let message = Message::from_digest(sha256(message));
    let signature =
        Signature::from_compact(signature_bytes).map_err(|_| CryptoError::VerificationFailed)?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| CryptoError::VerificationFailed)
}
