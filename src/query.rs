//! Query terms and result-set algebra
//!
//! A caller describes a logical database query as an ordered list of
//! [`QueryField`] terms. Each term names an indexed field, carries a value or
//! wildcard pattern, and says how its hits combine with the hits accumulated
//! from earlier terms. Per-field hit lists are folded into a [`ResultSet`]
//! whose membership tests run on a single combined integer key, then flattened
//! once into a sorted, de-duplicated list of [`ResultEntry`] values.

use std::collections::HashMap;

/// How a query field's hits combine with the accumulated result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryLink {
    /// Replace the accumulator with this field's hits
    #[default]
    Init,
    /// Set union
    Or,
    /// Set intersection
    And,
    /// Set difference (accumulator minus this field's hits)
    Not,
    /// Symmetric difference
    Eor,
    /// Symmetric difference, but the field is skipped entirely when the
    /// accumulator is already non-empty ("try next only if nothing matched")
    Else,
}

/// One term of a logical database query
#[derive(Debug, Clone)]
pub struct QueryField {
    /// Indexed field name; `id` addresses the primary entry-name index,
    /// anything else a secondary index of that name
    pub field: String,
    /// Entry value for exact lookup, or a `*`/`?` wildcard pattern
    pub pattern: String,
    /// Combination operator against the accumulated result
    pub link: QueryLink,
}

impl QueryField {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>, link: QueryLink) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
            link,
        }
    }

    /// Whether this term addresses the primary entry-name index
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.field.eq_ignore_ascii_case("id")
    }
}

/// One matched record: the division holding it and the byte offset of its
/// annotation within that division's data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultEntry {
    /// Division code — 1-based for the fixed format, 0-based file index for
    /// the variable format
    pub division: u32,
    /// Byte offset into the division's data file
    pub offset: u64,
}

impl ResultEntry {
    #[must_use]
    pub fn new(division: u32, offset: u64) -> Self {
        Self { division, offset }
    }

    /// Combined membership key: division in the high 64 bits, offset in the
    /// low 64
    fn key(self) -> u128 {
        (u128::from(self.division) << 64) | u128::from(self.offset)
    }
}

/// Accumulator for combining per-field hit lists
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: HashMap<u128, ResultEntry>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when an [`QueryLink::Else`] field must be skipped: the
    /// accumulator already holds a result from an earlier field.
    #[must_use]
    pub fn short_circuits(&self, link: QueryLink) -> bool {
        link == QueryLink::Else && !self.is_empty()
    }

    /// Folds one field's hit list into the accumulator.
    ///
    /// The hit list may carry duplicates; they are collapsed before the set
    /// operation so a duplicated hit cannot toggle itself out of a symmetric
    /// difference. `Else` combines like `Eor` — callers apply the
    /// short-circuit rule via [`Self::short_circuits`] before calling.
    pub fn combine(&mut self, link: QueryLink, hits: &[ResultEntry]) {
        let mut incoming: HashMap<u128, ResultEntry> = HashMap::with_capacity(hits.len());
        for &hit in hits {
            incoming.insert(hit.key(), hit);
        }
        match link {
            QueryLink::Init => {
                self.entries = incoming;
            }
            QueryLink::Or => {
                self.entries.extend(incoming);
            }
            QueryLink::And => {
                self.entries.retain(|key, _| incoming.contains_key(key));
            }
            QueryLink::Not => {
                self.entries.retain(|key, _| !incoming.contains_key(key));
            }
            QueryLink::Eor | QueryLink::Else => {
                for (key, hit) in incoming {
                    if self.entries.remove(&key).is_none() {
                        self.entries.insert(key, hit);
                    }
                }
            }
        }
    }

    /// Flattens the accumulator into the final result list, ordered by
    /// (division ascending, offset ascending). Performed once after the last
    /// field, not per field.
    #[must_use]
    pub fn into_sorted(self) -> Vec<ResultEntry> {
        let mut list: Vec<ResultEntry> = self.entries.into_values().collect();
        list.sort_by_key(|entry| (entry.division, entry.offset));
        list
    }
}
