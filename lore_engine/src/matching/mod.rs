//! Key matching: regex literal cache, keyword matcher, and group scoring.

mod matcher;
mod regex_cache;
mod score;

pub use matcher::*;
pub use regex_cache::*;
pub use score::*;

use serde::{Deserialize, Serialize};

/// An extra key group an entry must (or must not) match, ANDed with the
/// primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keys: Vec<String>,
    /// Invert the query result.
    pub negative: bool,
    /// Require every key instead of any key.
    pub all: bool,
}

impl SearchQuery {
    pub fn new(keys: Vec<String>, negative: bool, all: bool) -> Self {
        Self {
            keys,
            negative,
            all,
        }
    }
}
