// src/assemble.rs
//! Result assembler: positional buffer + prefix truncation.

use crate::fetch::Outcome;
use crate::provider::ContentItem;

/// Place every outcome at its ordinal and cut the result at the first empty slot.
///
/// Callers receive what a strictly sequential fetch would have produced had it
/// stopped at the first unrecoverable position: never a gap followed by data.
pub fn assemble<I>(count: usize, outcomes: I) -> Vec<ContentItem>
where
    I: IntoIterator<Item = Outcome>,
{
    let mut buffer: Vec<Option<ContentItem>> = (0..count).map(|_| None).collect();
    for outcome in outcomes {
        match buffer.get_mut(outcome.ordinal) {
            Some(cell) => *cell = outcome.item,
            None => tracing::warn!(
                target: "feed",
                ordinal = outcome.ordinal,
                count,
                "outcome outside the requested window dropped"
            ),
        }
    }
    truncate_at_first_gap(buffer)
}

/// Longest gap-free prefix of filled cells.
pub fn truncate_at_first_gap<T>(buffer: Vec<Option<T>>) -> Vec<T> {
    buffer.into_iter().map_while(|cell| cell).collect()
}
