//! Per-division exclusion masks
//!
//! A logical database spans several physical data files (divisions). Callers
//! may restrict a query to a subset of them with an explicit filename wildcard
//! and an exclusion list; withdrawn divisions are then dropped from results at
//! hit time rather than surfacing stale entries. The mask is computed once per
//! session open and consulted on every hit.

use log::debug;

use crate::wildcard;

/// Boolean exclusion mask over division slots.
///
/// Slot numbering follows the owning format: the fixed format's 1-based
/// division codes index slot `code - 1`, the variable format's 0-based file
/// ids index their slot directly.
#[derive(Debug, Clone)]
pub struct SkipTable {
    skip: Vec<bool>,
}

impl SkipTable {
    /// Builds the mask from one filename per division slot.
    ///
    /// A division is kept when its filename matches `filename_filter` (a
    /// single wildcard, `None` meaning `*`) and matches none of the
    /// space-separated wildcards in `exclude`. Filename matching is never
    /// case-folded.
    #[must_use]
    pub fn build(filenames: &[String], filename_filter: Option<&str>, exclude: Option<&str>) -> Self {
        let filter = filename_filter.unwrap_or("*");
        let excluded: Vec<&str> = exclude.map_or_else(Vec::new, |e| e.split_whitespace().collect());

        let skip = filenames
            .iter()
            .map(|name| {
                let base = basename(name);
                let keep = wildcard::matches(filter.as_bytes(), base.as_bytes(), false)
                    && !excluded
                        .iter()
                        .any(|pat| wildcard::matches(pat.as_bytes(), base.as_bytes(), false));
                if !keep {
                    debug!("division file excluded from query: {name}");
                }
                !keep
            })
            .collect();
        Self { skip }
    }

    /// An all-keep mask for `n` divisions
    #[must_use]
    pub fn keep_all(n: usize) -> Self {
        Self {
            skip: vec![false; n],
        }
    }

    /// Whether hits in the given slot may surface as results.
    ///
    /// Slots outside the table are rejected; the caller logs and drops the
    /// hit carrying the stray division code.
    #[must_use]
    pub fn allows(&self, slot: usize) -> bool {
        self.skip.get(slot).is_some_and(|&skipped| !skipped)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skip.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skip.is_empty()
    }
}

/// Final path component of a division filename, tolerating either separator
fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
