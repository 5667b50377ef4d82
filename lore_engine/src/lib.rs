//! # Lore Engine
//!
//! Keyword-triggered lore activation. Given the books from `lore_book` and
//! the live conversation, the engine decides which entries are relevant to
//! the current turn, in what order, and within what token budget.
//!
//! ## Core Components
//!
//! - **scan**: The bounded text window entries are matched against
//! - **matching**: Keyword and regex matching with a shared regex cache
//! - **dialect**: Per-entry evaluation, plain or `@@`-decorated
//! - **activation**: Recursive passes, inclusion groups, budget, output
//! - **collaborators**: Token estimator, RNG, timed effects, warnings
//!
//! ## Design Philosophy
//!
//! - **Caller-Owned State**: Timed effects and after-match flags are read through traits and never written
//! - **Deterministic**: All randomness comes from an injected source
//! - **Total**: Bad data rejects an entry or fails a match; only configuration errors are returned

pub mod activation;
pub mod collaborators;
pub mod dialect;
pub mod error;
pub mod matching;
pub mod scan;

pub use activation::*;
pub use collaborators::*;
pub use dialect::*;
pub use error::*;
pub use matching::*;
pub use scan::*;

pub use lore_book;
