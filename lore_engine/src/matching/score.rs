//! Match strength, used only to break ties inside inclusion groups.

use lore_book::SelectiveLogic;

use super::{MatchOptions, Matcher};

/// Score an entry's keys against `haystack`.
///
/// Empty text or no primary keys scores 0. With secondary keys, `AndAll`
/// adds the secondary count only when every secondary key matched; the
/// other logics always add it.
pub fn score(
    matcher: &Matcher<'_>,
    haystack: &str,
    primary: &[String],
    secondary: &[String],
    logic: SelectiveLogic,
    options: MatchOptions,
) -> usize {
    if haystack.is_empty() || primary.is_empty() {
        return 0;
    }

    let primary_score = matcher.count(haystack, primary, options);
    if secondary.is_empty() {
        return primary_score;
    }

    let secondary_score = matcher.count(haystack, secondary, options);
    match logic {
        SelectiveLogic::AndAll if secondary_score < secondary.len() => primary_score,
        _ => primary_score + secondary_score,
    }
}
