//! Dependency tracking for formula calculation
//!
//! The graph is an adjacency map keyed by cell coordinates. Every edge is
//! stored twice, once from each end, and the two maps are kept exact
//! inverses of each other.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use ahash::{AHashMap, AHashSet};
use pricematrix_core::{CellAddress, MatrixLimits};
use tracing::warn;

use crate::ast::FormulaExpr;

/// Unique key for a cell within one matrix
///
/// Orders row-major, which gives deterministic tie-breaking wherever the
/// graph has to choose between independent cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Create from a cell address, ignoring absolute markers
    pub fn from_address(addr: &CellAddress) -> Self {
        Self::new(addr.row, addr.col)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&CellAddress::new(self.row, self.col).to_a1_string())
    }
}

/// Every cell inside `limits` that a formula reads, ranges expanded
///
/// Cells past the limits can never be written, so they get no edges.
pub fn collect_precedents(expr: &FormulaExpr, limits: &MatrixLimits) -> AHashSet<CellKey> {
    let mut keys = AHashSet::new();
    for range in expr.references() {
        if let Some(range) = range.clamped(limits.max_rows, limits.max_cols) {
            keys.extend(range.cells().map(|addr| CellKey::from_address(&addr)));
        }
    }
    keys
}

/// Dependency graph for formula cells
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace the precedents of `cell`
    ///
    /// Cells that depend on `cell` keep their edges.
    pub fn set_precedents(&mut self, cell: CellKey, precedents: &AHashSet<CellKey>) {
        self.remove_precedents(cell);
        for &precedent in precedents {
            self.add_dependency(precedent, cell);
        }
    }

    /// Drop every edge from a precedent into `cell`
    pub fn remove_precedents(&mut self, cell: CellKey) {
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Get cells that depend on the given cell
    pub fn get_dependents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether giving `cell` these precedents would close a cycle
    ///
    /// Runs before any edge is committed: walks the existing dependents of
    /// `cell` breadth-first and reports whether one of the proposed
    /// precedents is reachable. Each cell is visited at most once.
    pub fn would_create_cycle(&self, cell: CellKey, precedents: &AHashSet<CellKey>) -> bool {
        if precedents.contains(&cell) {
            return true;
        }
        if precedents.is_empty() {
            return false;
        }

        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([cell]);
        visited.insert(cell);

        while let Some(current) = queue.pop_front() {
            for dependent in self.get_dependents(current) {
                if precedents.contains(&dependent) {
                    return true;
                }
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        false
    }

    /// Every cell that transitively depends on one of `roots`
    ///
    /// Roots are only included when they are themselves reachable from
    /// another root.
    pub fn transitive_dependents(&self, roots: &[CellKey]) -> AHashSet<CellKey> {
        let mut seen = AHashSet::new();
        let mut stack: Vec<CellKey> = roots.to_vec();

        while let Some(current) = stack.pop() {
            for dependent in self.get_dependents(current) {
                if seen.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }

        seen
    }

    /// Order `cells` so every cell comes after its precedents in the set
    ///
    /// Kahn's algorithm restricted to the subset; ready cells are taken in
    /// row-major order so the result is deterministic.
    pub fn topological_order(&self, cells: &AHashSet<CellKey>) -> Vec<CellKey> {
        self.levels(cells).into_iter().flatten().collect()
    }

    /// Partition `cells` into layers of mutually independent cells
    ///
    /// Every cell's in-set precedents sit in earlier layers, so the cells of
    /// one layer can be evaluated in any order or concurrently.
    pub fn levels(&self, cells: &AHashSet<CellKey>) -> Vec<Vec<CellKey>> {
        let mut in_degree: AHashMap<CellKey, usize> = cells
            .iter()
            .map(|&cell| {
                let degree = self
                    .get_precedents(cell)
                    .filter(|p| cells.contains(p))
                    .count();
                (cell, degree)
            })
            .collect();

        let mut ready: BTreeSet<CellKey> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&cell, _)| cell)
            .collect();

        let mut levels = Vec::new();
        let mut placed = 0;

        while !ready.is_empty() {
            let level: Vec<CellKey> = std::mem::take(&mut ready).into_iter().collect();
            for &cell in &level {
                for dependent in self.get_dependents(cell) {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(dependent);
                        }
                    }
                }
            }
            placed += level.len();
            levels.push(level);
        }

        if placed < cells.len() {
            // Only reachable if a cycle slipped past would_create_cycle
            let mut rest: Vec<CellKey> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(cell, _)| cell)
                .collect();
            rest.sort();
            warn!(cells = rest.len(), "cycle in recalculation set");
            levels.push(rest);
        }

        levels
    }

    /// Whether the precedent and dependent maps mirror each other exactly
    pub fn check_consistency(&self) -> bool {
        let forward = self.precedents.iter().all(|(&cell, precs)| {
            !precs.is_empty()
                && precs
                    .iter()
                    .all(|p| self.dependents.get(p).map_or(false, |d| d.contains(&cell)))
        });
        let backward = self.dependents.iter().all(|(&cell, deps)| {
            !deps.is_empty()
                && deps
                    .iter()
                    .all(|d| self.precedents.get(d).map_or(false, |p| p.contains(&cell)))
        });
        forward && backward
    }

    /// Whether any cell reachable through precedents from `cell` leads back to it
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        let mut visited = AHashSet::new();
        let mut stack: Vec<CellKey> = self.get_precedents(cell).collect();

        while let Some(current) = stack.pop() {
            if current == cell {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.get_precedents(current));
            }
        }

        false
    }

    /// Number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.precedents.values().map(|s| s.len()).sum()
    }

    /// Whether the graph has no edges
    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}
