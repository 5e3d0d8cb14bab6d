// crates/aludel-core/src/permission.rs
//
// Signed vault permissions.
//
// A permission authorizes a delegate (a reward program) to lock or unlock an
// exact amount of one token inside a vault. It is bound to the vault's current
// nonce, so each signature is single-use. The digest follows typed-data
// structure hashing under the fixed domain ("UniversalVault", "1.0.0").

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::Keypair;

/// Typed-data domain name shared by every vault.
pub const DOMAIN_NAME: &str = "UniversalVault";

/// Typed-data domain version shared by every vault.
pub const DOMAIN_VERSION: &str = "1.0.0";

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Which vault call a permission authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    Lock,
    Unlock,
}

impl PermissionKind {
    fn type_string(&self) -> &'static str {
        match self {
            PermissionKind::Lock => {
                "Lock(address delegate,address token,uint256 amount,uint256 nonce)"
            }
            PermissionKind::Unlock => {
                "Unlock(address delegate,address token,uint256 amount,uint256 nonce)"
            }
        }
    }
}

/// The structured fields a vault owner signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub kind: PermissionKind,
    pub delegate: Address,
    pub token: Address,
    pub amount: U256,
    pub nonce: U256,
}

/// A detached signature over a permission digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPermission(pub Vec<u8>);

impl SignedPermission {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Domain separator for a vault deployed at `vault` on `chain_id`.
pub fn domain_separator(chain_id: u64, vault: Address) -> B256 {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(keccak256(DOMAIN_TYPE).as_slice());
    buf.extend_from_slice(keccak256(DOMAIN_NAME).as_slice());
    buf.extend_from_slice(keccak256(DOMAIN_VERSION).as_slice());
    buf.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    buf.extend_from_slice(vault.into_word().as_slice());
    keccak256(&buf)
}

impl Permission {
    /// Hash of the permission struct, without the domain.
    pub fn struct_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(keccak256(self.kind.type_string()).as_slice());
        buf.extend_from_slice(self.delegate.into_word().as_slice());
        buf.extend_from_slice(self.token.into_word().as_slice());
        buf.extend_from_slice(&self.amount.to_be_bytes::<32>());
        buf.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        keccak256(&buf)
    }

    /// The digest that is actually signed: `keccak256(0x1901 || domain || struct)`.
    pub fn digest(&self, chain_id: u64, vault: Address) -> B256 {
        let mut buf = Vec::with_capacity(2 + 64);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(domain_separator(chain_id, vault).as_slice());
        buf.extend_from_slice(self.struct_hash().as_slice());
        keccak256(&buf)
    }

    /// Sign this permission for the vault at `vault`.
    pub fn sign(&self, owner: &Keypair, chain_id: u64, vault: Address) -> SignedPermission {
        let digest = self.digest(chain_id, vault);
        SignedPermission(owner.sign(digest.as_slice()))
    }
}

/// Build and sign a permission in one call.
#[allow(clippy::too_many_arguments)]
pub fn sign_permission(
    kind: PermissionKind,
    owner: &Keypair,
    chain_id: u64,
    vault: Address,
    delegate: Address,
    token: Address,
    amount: U256,
    nonce: U256,
) -> SignedPermission {
    Permission {
        kind,
        delegate,
        token,
        amount,
        nonce,
    }
    .sign(owner, chain_id, vault)
}
