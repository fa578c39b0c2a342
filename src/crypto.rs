use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;

/// Length of an uncompressed SEC1 secp256k1 public key
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a SHA-256 digest
pub const HASH_LEN: usize = 32;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
}

/// A SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Checks whether the first `bits` bits of the digest are zero
    ///
    /// This is the proof-of-work acceptance test: the difficulty is a
    /// bit count, not a byte count.
    pub fn has_leading_zero_bits(&self, bits: u8) -> bool {
        let full_bytes = (bits / 8) as usize;
        let partial_bits = bits % 8;

        if self.0[..full_bytes].iter().any(|&byte| byte != 0) {
            return false;
        }

        if partial_bits > 0 {
            return self.0[full_bytes] >> (8 - partial_bits) == 0;
        }

        true
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

/// An account address: the owner's public key in 65-byte uncompressed
/// SEC1 form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; PUBLIC_KEY_LEN]);

impl Address {
    /// Creates an address from a verifying key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let point = public_key.to_encoded_point(false);

        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());

        Address(bytes)
    }

    /// Converts the address back to a verifying key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full keys are 130 hex characters; an 8-byte prefix is enough
        // to tell accounts apart in debug output.
        write!(f, "Address({}..)", hex::encode(&self.0[..8]))
    }
}

/// Computes the SHA-256 digest of a byte string
pub fn sha256(bytes: &[u8]) -> Hash {
    Hash(Sha256::digest(bytes).into())
}

/// A secp256k1 signing keypair
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Generates a new keypair from OS randomness
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = Address::from_public_key(signing_key.verifying_key());

        KeyPair {
            signing_key,
            address,
        }
    }

    /// Reconstructs a keypair from an exported secret key
    pub fn from_secret_bytes(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(secret_key_bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let address = Address::from_public_key(signing_key.verifying_key());

        Ok(KeyPair {
            signing_key,
            address,
        })
    }

    /// The address (public key) of this keypair
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs a message, returning the DER-encoded ECDSA signature
    ///
    /// The signature is always computed over `SHA256(message)`; callers
    /// pass raw message bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }

    /// Exports the secret key as bytes
    pub fn secret_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

/// Verifies a DER-encoded ECDSA signature over `SHA256(message)`
///
/// Malformed keys or signatures verify as false rather than erroring;
/// the caller only cares whether the signature holds.
pub fn verify_signature(address: &Address, message: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = address.to_public_key() else {
        return false;
    };
    let Ok(signature) = Signature::from_der(signature) else {
        return false;
    };

    public_key.verify(message, &signature).is_ok()
}

/// Fills a buffer of `n` bytes from the OS entropy source
pub fn secure_random(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Draws a random 64-bit value from the OS entropy source
pub fn random_u64() -> u64 {
    OsRng.next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"Hello, world!";

        let signature = keypair.sign(message);
        assert!(verify_signature(keypair.address(), message, &signature));

        // Verify with wrong message
        assert!(!verify_signature(keypair.address(), b"wrong message", &signature));

        // Verify with wrong key
        let other = KeyPair::generate();
        assert!(!verify_signature(other.address(), message, &signature));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let keypair = KeyPair::generate();
        assert!(!verify_signature(keypair.address(), b"msg", &[0u8; 70]));
        assert!(!verify_signature(keypair.address(), b"msg", &[]));
    }

    #[test]
    fn test_secret_key_roundtrip() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(&keypair.secret_bytes()).unwrap();

        assert_eq!(restored.address(), keypair.address());

        let signature = restored.sign(b"payload");
        assert!(verify_signature(keypair.address(), b"payload", &signature));
    }

    #[test]
    fn test_address_is_uncompressed_sec1() {
        let keypair = KeyPair::generate();
        let bytes = keypair.address().as_bytes();

        assert_eq!(bytes.len(), PUBLIC_KEY_LEN);
        // Uncompressed SEC1 points carry the 0x04 tag byte.
        assert_eq!(bytes[0], 0x04);

        let public_key = keypair.address().to_public_key().unwrap();
        assert_eq!(&Address::from_public_key(&public_key), keypair.address());
    }

    #[test]
    fn test_sha256_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_leading_zero_bits() {
        // First 20 bits zero, bit 21 set.
        let mut bytes = [0xFFu8; HASH_LEN];
        bytes[0] = 0x00;
        bytes[1] = 0x00;
        bytes[2] = 0x0F;
        let hash = Hash(bytes);

        assert!(hash.has_leading_zero_bits(20));
        assert!(!hash.has_leading_zero_bits(21));

        // Flip bit 20 on: only 19 leading zeros remain.
        bytes[2] = 0x1F;
        let hash = Hash(bytes);
        assert!(hash.has_leading_zero_bits(19));
        assert!(!hash.has_leading_zero_bits(20));
    }

    #[test]
    fn test_leading_zero_bits_byte_boundary() {
        let mut bytes = [0xFFu8; HASH_LEN];
        bytes[0] = 0x00;
        let hash = Hash(bytes);

        assert!(hash.has_leading_zero_bits(0));
        assert!(hash.has_leading_zero_bits(8));
        assert!(!hash.has_leading_zero_bits(9));
    }

    #[test]
    fn test_secure_random_length() {
        assert_eq!(secure_random(16).len(), 16);
        assert_eq!(secure_random(0).len(), 0);
    }
}
