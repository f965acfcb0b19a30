use serde::Serialize;

use crate::blockchain::{Block, Blockchain, SharedChain, shared};

/// State shared with every handler: a read handle on the node's chain.
/// Handlers never append; only the node's mining round writes.
#[derive(Clone)]
pub struct AppState {
    pub blockchain: SharedChain,
}

impl AppState {
    pub fn new(blockchain: SharedChain) -> Self {
        Self { blockchain }
    }
}

impl Default for AppState {
    fn default() -> Self {
        use crate::blockchain::DIFFICULTY;
        Self::new(shared(Blockchain::new(DIFFICULTY)))
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub valid: bool,
    pub chain: &'a [Block],
}
