//! Source ordering of entries across books, and final priority ordering.

use std::cmp::Reverse;

use lore_book::{BookSet, BookSource, InsertionStrategy, LoreBook, LoreEntry};

/// An entry together with the book it came from.
#[derive(Debug, Clone, Copy)]
pub struct BookEntry<'a> {
    pub entry: &'a LoreEntry,
    pub book: &'a LoreBook,
    pub source: BookSource,
}

impl<'a> BookEntry<'a> {
    pub fn order(&self) -> i64 {
        self.entry.insertion_order
    }
}

fn by_order(mut entries: Vec<BookEntry<'_>>) -> Vec<BookEntry<'_>> {
    entries.sort_by_key(|e| Reverse(e.order()));
    entries
}

/// Merge the four sources into evaluation order.
///
/// Each source is sorted by descending insertion order. Chat entries come
/// first, then persona entries, then character and global entries arranged
/// by `strategy`.
pub fn sort_entries<'a>(
    global: Vec<BookEntry<'a>>,
    character: Vec<BookEntry<'a>>,
    chat: Vec<BookEntry<'a>>,
    persona: Vec<BookEntry<'a>>,
    strategy: InsertionStrategy,
) -> Vec<BookEntry<'a>> {
    let base = match strategy {
        InsertionStrategy::CharacterLoreFirst => {
            let mut base = by_order(character);
            base.extend(by_order(global));
            base
        }
        InsertionStrategy::GlobalLoreFirst => {
            let mut base = by_order(global);
            base.extend(by_order(character));
            base
        }
        InsertionStrategy::Evenly => {
            let mut base = global;
            base.extend(character);
            by_order(base)
        }
    };

    let mut sorted = by_order(chat);
    sorted.extend(by_order(persona));
    sorted.extend(base);
    sorted
}

/// Collect every entry of `books` grouped by source and sort them.
pub fn sort_book_set(books: &BookSet, strategy: InsertionStrategy) -> Vec<BookEntry<'_>> {
    let collect = |source: BookSource| -> Vec<BookEntry<'_>> {
        books
            .books(source)
            .iter()
            .flat_map(|book| {
                book.entries.iter().map(move |entry| BookEntry {
                    entry,
                    book,
                    source,
                })
            })
            .collect()
    };

    sort_entries(
        collect(BookSource::Global),
        collect(BookSource::Character),
        collect(BookSource::Chat),
        collect(BookSource::Persona),
        strategy,
    )
}
