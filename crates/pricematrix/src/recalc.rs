//! Recalculation of dirty formula cells
//!
//! The dirty set is ordered with the dependency graph so every cell is
//! evaluated once, after the cells it reads. With the `parallel` feature the
//! cells of each dependency level are evaluated on the rayon pool and the
//! results written back before the next level starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashSet;
use pricematrix_core::CellValue;
use pricematrix_formula::{evaluate_cell, CellKey};
use tracing::{debug, info};

use crate::sheet::Sheet;

/// Cooperative cancellation for long recalculations
///
/// Checked between cell evaluations, never in the middle of one. Clones
/// share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Statistics from a recalculation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Number of formula cells evaluated
    pub cells_evaluated: usize,
    /// How many of them produced an error value
    pub errors: usize,
    /// Whether the run stopped early on its cancellation token
    pub cancelled: bool,
    /// Cells left dirty by a cancelled run
    pub remaining: usize,
}

impl RecalcStats {
    /// Combine the statistics of two runs
    pub fn merge(self, other: RecalcStats) -> RecalcStats {
        RecalcStats {
            cells_evaluated: self.cells_evaluated + other.cells_evaluated,
            errors: self.errors + other.errors,
            cancelled: self.cancelled || other.cancelled,
            remaining: self.remaining + other.remaining,
        }
    }
}

impl Sheet {
    /// Recalculate the accepted formulas among `roots` and everything that
    /// transitively depends on them
    pub(crate) fn recalc_from(&mut self, roots: &[CellKey], token: &CancellationToken) -> RecalcStats {
        let mut dirty = self.graph().transitive_dependents(roots);
        dirty.extend(roots.iter().copied().filter(|key| self.is_accepted(key)));
        self.recalc_cells(dirty, token)
    }

    /// Recalculate every accepted formula
    pub(crate) fn recalc_all(&mut self, token: &CancellationToken) -> RecalcStats {
        let dirty: AHashSet<CellKey> = self.accepted_formulas().map(|(&key, _)| key).collect();
        self.recalc_cells(dirty, token)
    }

    fn recalc_cells(&mut self, dirty: AHashSet<CellKey>, token: &CancellationToken) -> RecalcStats {
        let mut stats = RecalcStats::default();
        if dirty.is_empty() {
            return stats;
        }

        for &key in &dirty {
            self.mark_dirty(key);
        }
        let levels = self.graph().levels(&dirty);
        debug!(
            matrix = %self.name(),
            cells = dirty.len(),
            levels = levels.len(),
            "recalculating"
        );

        self.evaluate_levels(levels, token, &mut stats);

        stats.remaining = dirty.len() - stats.cells_evaluated;
        if stats.cancelled {
            info!(
                matrix = %self.name(),
                evaluated = stats.cells_evaluated,
                remaining = stats.remaining,
                "recalculation cancelled"
            );
        }
        stats
    }

    fn store_result(&mut self, key: CellKey, value: CellValue, stats: &mut RecalcStats) {
        stats.cells_evaluated += 1;
        if value.is_error() {
            stats.errors += 1;
        }
        self.store_value(key, value);
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_levels(
        &mut self,
        levels: Vec<Vec<CellKey>>,
        token: &CancellationToken,
        stats: &mut RecalcStats,
    ) {
        for key in levels.into_iter().flatten() {
            if token.is_cancelled() {
                stats.cancelled = true;
                return;
            }
            let Some(value) = self.evaluate_formula(key) else {
                continue;
            };
            self.store_result(key, value, stats);
        }
    }

    #[cfg(feature = "parallel")]
    fn evaluate_levels(
        &mut self,
        levels: Vec<Vec<CellKey>>,
        token: &CancellationToken,
        stats: &mut RecalcStats,
    ) {
        use rayon::prelude::*;

        for level in levels {
            if token.is_cancelled() {
                stats.cancelled = true;
                return;
            }
            let sheet = &*self;
            let results: Vec<(CellKey, CellValue)> = level
                .par_iter()
                .filter_map(|&key| sheet.evaluate_formula(key).map(|value| (key, value)))
                .collect();
            for (key, value) in results {
                self.store_result(key, value, stats);
            }
        }
    }

    fn evaluate_formula(&self, key: CellKey) -> Option<CellValue> {
        self.accepted_formula(&key)
            .map(|expr| evaluate_cell(key, expr, self))
    }
}
