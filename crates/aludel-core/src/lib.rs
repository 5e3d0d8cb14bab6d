// crates/aludel-core/src/lib.rs
//
// aludel-core: core types, errors, permissions, and collaborator traits for
// the Aludel reward engine.
//
// This is the leaf crate the rest of the workspace depends on. Amounts are
// 256-bit unsigned integers and identities are 20-byte addresses, so values
// line up one-to-one with the on-chain program being mirrored.

pub mod crypto;
pub mod error;
pub mod events;
pub mod gas;
pub mod permission;
pub mod traits;

// Re-export the primitive types so downstream crates need not name alloy.
pub use alloy_primitives::{Address, B256, U256};

pub use crypto::Keypair;
pub use error::{AludelError, GasError, TokenError, VaultError};
pub use events::{Event, EventLog, LogEntry};
pub use gas::GasMeter;
pub use permission::{sign_permission, Permission, PermissionKind, SignedPermission};
pub use traits::{RageQuitHandler, TokenLedger, VaultCapability};

/// Seconds since the Unix epoch, the chain's notion of time.
pub type Timestamp = u64;
