//! # Lore Book
//!
//! The "Lore Bible" crate - entries, books, and the external scan context the
//! activation engine reads. This crate holds data only and contains no
//! activation logic; the engine never mutates anything defined here.

pub mod book;
pub mod entry;
pub mod error;
pub mod options;

pub use book::*;
pub use entry::*;
pub use error::*;
pub use options::*;
