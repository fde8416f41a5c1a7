//! Fungible Asset Adapters
//!
//! Implements the `FungibleAssets` port. The in-memory bank backs
//! local runs and tests; on-chain token contracts are external.

pub mod in_memory;

pub use in_memory::InMemoryAssetBank;
