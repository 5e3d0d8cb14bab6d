// crates/aludel-core/src/crypto.rs
//
// Key material for vault owners and deterministic address derivation.
//
// Vault owners sign permissions with ed25519. An owner's address is the last
// 20 bytes of the keccak-256 hash of the public key, the same way an EVM
// account address is cut from its public key hash.

use alloy_primitives::{keccak256, Address};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::AludelError;

/// An ed25519 keypair for signing and verification.
#[derive(Clone)]
pub struct Keypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Keypair {
    /// Build a keypair deterministically from a seed label.
    ///
    /// Used by the simulator so named accounts get stable addresses across runs.
    pub fn from_seed(seed: &[u8]) -> Self {
        let signing_key = SigningKey::from_bytes(&hash_bytes(seed));
        let verifying_key = signing_key.verifying_key();
        Keypair {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key bytes (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The account address controlled by this keypair.
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Sign a message and return the signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Derive the account address for an ed25519 public key.
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let hash = keccak256(public_key);
    Address::from_slice(&hash[12..])
}

/// Derive the address of an object created by `creator` with the given nonce.
pub fn derive_address(creator: Address, nonce: u64) -> Address {
    let mut preimage = Vec::with_capacity(28);
    preimage.extend_from_slice(creator.as_slice());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    let hash = keccak256(&preimage);
    Address::from_slice(&hash[12..])
}

/// Verify an ed25519 signature.
///
/// Returns `true` if the signature is valid for the given message and public key.
pub fn verify_signature(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<bool, AludelError> {
    let verifying_key = VerifyingKey::from_bytes(public_key_bytes)
        .map_err(|e| AludelError::Crypto(format!("Invalid public key: {}", e)))?;

    let signature_array: [u8; 64] = match signature_bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };

    let signature = ed25519_dalek::Signature::from_bytes(&signature_array);

    match verifying_key.verify(message, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Compute SHA-256 hash of the given bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
