//! Keyword and regex matching against scan text.

use lore_book::SelectiveLogic;

use super::regex_cache::{CachedRegex, RegexCache};
use super::SearchQuery;
use crate::collaborators::Warner;

/// Inputs larger than this are never handed to a regex.
pub const MAX_REGEX_INPUT_BYTES: usize = 512 * 1024;

/// Whitespace, plus the control byte that joins scan segments.
fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || c == '\u{1}'
}

/// Case and word-boundary options for plain keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Matches keys against text using a shared regex cache.
pub struct Matcher<'a> {
    cache: &'a RegexCache,
    warner: &'a dyn Warner,
}

impl<'a> Matcher<'a> {
    pub fn new(cache: &'a RegexCache, warner: &'a dyn Warner) -> Self {
        Self { cache, warner }
    }

    /// Test one key against `haystack`.
    ///
    /// Regex literals carry their own flags and ignore `options`. A literal
    /// that fails to compile, or an oversized haystack, warns once and does
    /// not match.
    pub fn matches(&self, haystack: &str, needle: &str, options: MatchOptions) -> bool {
        if let Some(cached) = self.cache.get(needle) {
            return match cached {
                CachedRegex::Compiled(regex) => {
                    if haystack.len() > MAX_REGEX_INPUT_BYTES {
                        self.warner.warn(
                            &format!("regex-input:{needle}"),
                            &format!(
                                "scan text of {} bytes exceeds the regex input limit; key {needle} skipped",
                                haystack.len()
                            ),
                        );
                        return false;
                    }
                    regex.is_match(haystack)
                }
                CachedRegex::Invalid(reason) => {
                    self.warner.warn(
                        &format!("regex-compile:{needle}"),
                        &format!("invalid regex key {needle}: {reason}"),
                    );
                    false
                }
            };
        }

        let (haystack, needle) = if options.case_sensitive {
            (haystack.to_string(), needle.to_string())
        } else {
            (haystack.to_lowercase(), needle.to_lowercase())
        };

        if options.whole_word {
            if needle.split_whitespace().count() > 1 {
                return haystack.contains(needle.trim());
            }
            let needle = needle.trim();
            return !needle.is_empty()
                && haystack
                    .split(is_word_separator)
                    .any(|token| token == needle);
        }

        let needle: String = needle.chars().filter(|c| *c != ' ').collect();
        if needle.is_empty() {
            return false;
        }
        let haystack: String = haystack.chars().filter(|c| *c != ' ').collect();
        haystack.contains(&needle)
    }

    /// Whether any key in `keys` matches.
    pub fn any(&self, haystack: &str, keys: &[String], options: MatchOptions) -> bool {
        keys.iter().any(|key| self.matches(haystack, key, options))
    }

    /// Whether every key in `keys` matches.
    pub fn all(&self, haystack: &str, keys: &[String], options: MatchOptions) -> bool {
        keys.iter().all(|key| self.matches(haystack, key, options))
    }

    /// Count matching keys.
    pub fn count(&self, haystack: &str, keys: &[String], options: MatchOptions) -> usize {
        keys.iter()
            .filter(|key| self.matches(haystack, key, options))
            .count()
    }

    /// Full entry test: at least one primary key, then every query.
    ///
    /// Entries without primary keys never match here.
    pub fn matches_entry(
        &self,
        haystack: &str,
        primary: &[String],
        queries: &[SearchQuery],
        options: MatchOptions,
    ) -> bool {
        if primary.is_empty() || !self.any(haystack, primary, options) {
            return false;
        }
        queries.iter().all(|query| {
            if query.keys.is_empty() {
                return true;
            }
            let hit = if query.all {
                self.all(haystack, &query.keys, options)
            } else {
                self.any(haystack, &query.keys, options)
            };
            hit != query.negative
        })
    }

    /// Primary/secondary combination by selective logic, used outside the
    /// query path (author's note scanning and similar).
    pub fn selective_logic_matches(
        &self,
        haystack: &str,
        primary: &[String],
        secondary: &[String],
        logic: SelectiveLogic,
        options: MatchOptions,
    ) -> bool {
        if primary.is_empty() || !self.any(haystack, primary, options) {
            return false;
        }
        if secondary.is_empty() {
            return true;
        }
        match logic {
            SelectiveLogic::AndAny => self.any(haystack, secondary, options),
            SelectiveLogic::NotAll => !self.all(haystack, secondary, options),
            SelectiveLogic::NotAny => !self.any(haystack, secondary, options),
            SelectiveLogic::AndAll => self.all(haystack, secondary, options),
        }
    }
}
