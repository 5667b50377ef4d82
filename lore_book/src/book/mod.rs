//! Lorebooks and the set of books merged for one activation pass.

mod context;

pub use context::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::entry::LoreEntry;
use crate::error::{BookError, Result};

/// Where a book comes from. Chat and persona books take precedence over
/// character and global books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSource {
    Global,
    Character,
    Chat,
    Persona,
}

impl BookSource {
    /// Fallback display label for entries without a comment or name.
    pub fn label(&self) -> &'static str {
        match self {
            BookSource::Global => "global lore",
            BookSource::Character => "character lore",
            BookSource::Chat => "chat lore",
            BookSource::Persona => "persona lore",
        }
    }
}

/// A collection of entries with book-level scanning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreBook {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Scan depth for entries of this book that do not override it.
    #[serde(default)]
    pub scan_depth: Option<usize>,

    /// Token budget the book asks for.
    #[serde(default)]
    pub token_budget: Option<usize>,

    /// Whether activated content from this book feeds recursive scanning.
    #[serde(default)]
    pub recursive_scanning: bool,

    #[serde(default)]
    pub entries: Vec<LoreEntry>,

    #[serde(default)]
    pub extensions: Map<String, Value>,
}

impl LoreBook {
    /// Create a new empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a book from its JSON export.
    ///
    /// Entry ids must be unique within the book.
    pub fn from_json(json: &str) -> Result<Self> {
        let book: LoreBook = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for entry in &book.entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(BookError::InvalidValue(format!(
                    "duplicate entry id {}",
                    entry.id
                )));
            }
        }
        Ok(book)
    }

    /// Set the book name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an entry.
    pub fn with_entry(mut self, entry: LoreEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add several entries.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = LoreEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Enable or disable recursive scanning.
    pub fn with_recursive_scanning(mut self, recursive: bool) -> Self {
        self.recursive_scanning = recursive;
        self
    }

    /// Set the book scan depth.
    pub fn with_scan_depth(mut self, depth: usize) -> Self {
        self.scan_depth = Some(depth);
        self
    }

    /// Set the book token budget.
    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = Some(budget);
        self
    }

    /// Number of enabled entries.
    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }
}

/// All books taking part in one activation pass, by source.
#[derive(Debug, Clone, Default)]
pub struct BookSet {
    pub global: Vec<LoreBook>,
    pub character: Vec<LoreBook>,
    pub chat: Vec<LoreBook>,
    pub persona: Vec<LoreBook>,
}

impl BookSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book under the given source.
    pub fn add(&mut self, source: BookSource, book: LoreBook) {
        self.books_mut(source).push(book);
    }

    /// Builder form of [`BookSet::add`].
    pub fn with_book(mut self, source: BookSource, book: LoreBook) -> Self {
        self.add(source, book);
        self
    }

    /// Books of one source.
    pub fn books(&self, source: BookSource) -> &[LoreBook] {
        match source {
            BookSource::Global => &self.global,
            BookSource::Character => &self.character,
            BookSource::Chat => &self.chat,
            BookSource::Persona => &self.persona,
        }
    }

    fn books_mut(&mut self, source: BookSource) -> &mut Vec<LoreBook> {
        match source {
            BookSource::Global => &mut self.global,
            BookSource::Character => &mut self.character,
            BookSource::Chat => &mut self.chat,
            BookSource::Persona => &mut self.persona,
        }
    }

    /// Iterate every book with its source.
    pub fn iter(&self) -> impl Iterator<Item = (BookSource, &LoreBook)> {
        [
            BookSource::Global,
            BookSource::Character,
            BookSource::Chat,
            BookSource::Persona,
        ]
        .into_iter()
        .flat_map(move |source| self.books(source).iter().map(move |book| (source, book)))
    }

    /// Total number of entries across all books.
    pub fn entry_count(&self) -> usize {
        self.iter().map(|(_, book)| book.entries.len()).sum()
    }

    /// Smallest positive token budget any book asks for.
    pub fn token_budget(&self) -> Option<usize> {
        self.iter()
            .filter_map(|(_, book)| book.token_budget)
            .filter(|budget| *budget > 0)
            .min()
    }
}
