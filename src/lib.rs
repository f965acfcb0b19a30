//! A minimal distributed ledger node.
//!
//! Records are batched, mined into a block by several racing Proof-of-Work
//! workers, ratified by a majority of peers through their `/validate`
//! endpoint, and only then appended to the local chain.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod fetch;
pub mod mining;
pub mod node;
pub mod producer;
pub mod record;
