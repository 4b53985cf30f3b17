//! Greedy rectangle cover over sparse cell maps.
//!
//! Used wherever per-cell state is folded back into range-addressed entries:
//! formula range compression, format rule derivation, and request batching.

use std::collections::{BTreeMap, BTreeSet};

use crate::{CellRef, Range};

/// Cover `cells` with rectangles whose cells all carry the same key.
///
/// Cells are visited in row-major order. From each unvisited cell two
/// candidates are grown (rightward-then-down and downward-then-right) and the
/// larger one is taken. Every input cell lands in exactly one rectangle.
pub fn cover_rectangles<K: Clone + PartialEq>(cells: &BTreeMap<CellRef, K>) -> Vec<(Range, K)> {
    let mut visited: BTreeSet<CellRef> = BTreeSet::new();
    let mut out = Vec::new();

    for (&start, key) in cells {
        if visited.contains(&start) {
            continue;
        }

        let matches = |cell: CellRef| -> bool {
            !visited.contains(&cell) && cells.get(&cell).is_some_and(|k| k == key)
        };

        let horizontal = {
            let width = run_length(|i| CellRef::new(start.row, start.col + i), &matches);
            let height = run_length(
                |i| CellRef::new(start.row + i, start.col),
                |cell| (0..width).all(|dc| matches(CellRef::new(cell.row, cell.col + dc))),
            );
            (width, height)
        };
        let vertical = {
            let height = run_length(|i| CellRef::new(start.row + i, start.col), &matches);
            let width = run_length(
                |i| CellRef::new(start.row, start.col + i),
                |cell| (0..height).all(|dr| matches(CellRef::new(cell.row + dr, cell.col))),
            );
            (width, height)
        };

        let area = |(w, h): (u32, u32)| u64::from(w) * u64::from(h);
        let (width, height) = if area(vertical) > area(horizontal) {
            vertical
        } else {
            horizontal
        };

        let range = Range::new(
            start,
            CellRef::new(start.row + height - 1, start.col + width - 1),
        );
        visited.extend(range.cells());
        out.push((range, key.clone()));
    }

    out
}

/// Length of a run (always at least 1, the start cell) while `accept` holds
/// for successive cells produced by `step`.
fn run_length(step: impl Fn(u32) -> CellRef, accept: impl Fn(CellRef) -> bool) -> u32 {
    let mut len = 1u32;
    loop {
        let next = step(len);
        if next.row >= crate::MAX_ROWS || next.col >= crate::MAX_COLS || !accept(next) {
            return len;
        }
        len += 1;
    }
}
