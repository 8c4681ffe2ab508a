//! Ledger adapters.
//!
//! Two append-only ledgers behind one trait:
//! - Permissioned: endorsed, ordered channel log
//! - Public: hash-linked block chain with confirmation depth

pub mod adapter;
pub mod config;
pub mod factory;
pub mod permissioned;
pub mod public;

pub use adapter::{Confirmation, LedgerAdapter, LedgerKind, LedgerReceipt};
pub use config::{PermissionedLedgerConfig, PublicLedgerConfig};
pub use factory::{create_ledger_adapters, LedgerPair};
pub use permissioned::PermissionedLedger;
pub use public::{ChainBlock, PublicLedger};
