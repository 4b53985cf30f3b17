//! Cell content: values, formulas, array formulas, notes, rich text runs and
//! pivot tables.

use std::collections::{BTreeMap, BTreeSet};

use extrasheet_model::{
    compress_formulas, CellRef, CellValue, PivotTable, Range, Sheet, TextFormatRun,
    MIN_RANGE_CELLS,
};

use super::EntityChanges;

/// What a cell should hold after the push.
#[derive(Clone, Debug, PartialEq)]
pub enum CellContent {
    Value(CellValue),
    Formula(String),
}

impl CellContent {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Value(v) if v.is_empty())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellChange {
    pub cell: CellRef,
    pub kind: ChangeKind,
    pub old: CellContent,
    pub new: CellContent,
}

impl CellChange {
    fn new(cell: CellRef, old: CellContent, new: CellContent) -> Self {
        let kind = if old.is_empty() {
            ChangeKind::Added
        } else if new.is_empty() {
            ChangeKind::Removed
        } else {
            ChangeKind::Modified
        };
        Self {
            cell,
            kind,
            old,
            new,
        }
    }
}

/// A rectangle of new formulas sharing one relative template. `formula` is
/// the anchor (top-left) cell's formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormulaRangeChange {
    pub range: Range,
    pub formula: String,
}

/// An array formula set (or replaced) at `range`, or cleared when `formula`
/// is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayFormulaChange {
    pub range: Range,
    pub formula: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteChange {
    pub cell: CellRef,
    pub note: Option<String>,
}

/// New rich text runs of a cell; empty clears them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRunChange {
    pub cell: CellRef,
    pub runs: Vec<TextFormatRun>,
}

pub(crate) struct ContentDiff {
    pub cells: Vec<CellChange>,
    pub formula_ranges: Vec<FormulaRangeChange>,
    pub array_formulas: Vec<ArrayFormulaChange>,
}

/// How a cell is authored in one model.
enum Authored<'a> {
    Value(&'a CellValue),
    Formula(&'a str),
    /// Inside the output range of an array formula (anchor included).
    Array(Range),
    DataSource,
}

fn authored(sheet: &Sheet, cell: CellRef) -> Authored<'_> {
    if sheet.data_source_formulas.contains_key(&cell) {
        Authored::DataSource
    } else if let Some(formula) = sheet.formula_at(cell) {
        Authored::Formula(formula)
    } else if let Some(range) = sheet.array_range_at(cell) {
        Authored::Array(range)
    } else {
        Authored::Value(sheet.value_at(cell))
    }
}

fn touched_cells(sheet: &Sheet, out: &mut BTreeSet<CellRef>) {
    out.extend(sheet.values.keys().copied());
    out.extend(sheet.formulas.keys().copied());
    out.extend(sheet.data_source_formulas.keys().copied());
    for range in sheet.array_formulas.keys() {
        out.extend(range.cells());
    }
}

pub(crate) fn diff_content(old: &Sheet, new: &Sheet) -> ContentDiff {
    let mut cells = BTreeSet::new();
    touched_cells(old, &mut cells);
    touched_cells(new, &mut cells);

    let mut changes = Vec::new();
    for cell in cells {
        let before = authored(old, cell);
        let after = authored(new, cell);
        let cached = || CellContent::Value(old.value_at(cell).clone());
        let change = match (before, after) {
            (Authored::DataSource, _) | (_, Authored::DataSource) => None,
            (Authored::Array(_), Authored::Array(_)) => None,
            (before, Authored::Array(range)) => {
                // The array spills into this cell; anything typed there must go.
                let old_content = match before {
                    Authored::Formula(f) => CellContent::Formula(f.to_string()),
                    _ => cached(),
                };
                (cell != range.start && !old_content.is_empty()).then(|| {
                    CellChange::new(cell, old_content, CellContent::Value(CellValue::Empty))
                })
            }
            (Authored::Array(_), Authored::Formula(f)) => Some(CellChange::new(
                cell,
                cached(),
                CellContent::Formula(f.to_string()),
            )),
            (Authored::Array(_), Authored::Value(v)) => (!v.is_empty())
                .then(|| CellChange::new(cell, cached(), CellContent::Value(v.clone()))),
            (Authored::Formula(a), Authored::Formula(b)) => {
                if a != b {
                    Some(CellChange::new(
                        cell,
                        CellContent::Formula(a.to_string()),
                        CellContent::Formula(b.to_string()),
                    ))
                } else {
                    if old.value_at(cell) != new.value_at(cell) {
                        log::debug!(
                            "{}!{cell}: cached value of a formula cell changed; ignored",
                            new.title()
                        );
                    }
                    None
                }
            }
            (Authored::Formula(a), Authored::Value(v)) => Some(CellChange::new(
                cell,
                CellContent::Formula(a.to_string()),
                CellContent::Value(v.clone()),
            )),
            (Authored::Value(v), Authored::Formula(b)) => Some(CellChange::new(
                cell,
                CellContent::Value(v.clone()),
                CellContent::Formula(b.to_string()),
            )),
            (Authored::Value(a), Authored::Value(b)) => (a != b).then(|| {
                CellChange::new(cell, CellContent::Value(a.clone()), CellContent::Value(b.clone()))
            }),
        };
        changes.extend(change);
    }

    for (cell, formula) in &new.data_source_formulas {
        if old.data_source_formulas.get(cell) != Some(formula) {
            log::warn!(
                "{}!{cell}: data source formula changed; data source formulas are read-only and will not be pushed",
                new.title()
            );
        }
    }
    for cell in old.data_source_formulas.keys() {
        if !new.data_source_formulas.contains_key(cell) {
            log::warn!(
                "{}!{cell}: data source formula removed; data source formulas are read-only and will not be pushed",
                new.title()
            );
        }
    }

    let (cells, formula_ranges) = group_formula_changes(changes);
    ContentDiff {
        cells,
        formula_ranges,
        array_formulas: diff_array_formulas(old, new),
    }
}

/// Fold runs of new formulas sharing a relative template back into ranges.
fn group_formula_changes(changes: Vec<CellChange>) -> (Vec<CellChange>, Vec<FormulaRangeChange>) {
    let new_formulas: BTreeMap<CellRef, String> = changes
        .iter()
        .filter_map(|c| match &c.new {
            CellContent::Formula(f) => Some((c.cell, f.clone())),
            CellContent::Value(_) => None,
        })
        .collect();

    let mut grouped: BTreeSet<CellRef> = BTreeSet::new();
    let mut ranges = Vec::new();
    for entry in compress_formulas(&new_formulas) {
        if entry.range.area() >= MIN_RANGE_CELLS {
            grouped.extend(entry.range.cells());
            ranges.push(FormulaRangeChange {
                range: entry.range,
                formula: entry.formula,
            });
        }
    }

    let cells = changes
        .into_iter()
        .filter(|c| !grouped.contains(&c.cell))
        .collect();
    (cells, ranges)
}

fn diff_array_formulas(old: &Sheet, new: &Sheet) -> Vec<ArrayFormulaChange> {
    let mut out = Vec::new();
    for range in old.array_formulas.keys() {
        if !new.array_formulas.contains_key(range) {
            out.push(ArrayFormulaChange {
                range: *range,
                formula: None,
            });
        }
    }
    for (range, formula) in &new.array_formulas {
        if old.array_formulas.get(range) != Some(formula) {
            out.push(ArrayFormulaChange {
                range: *range,
                formula: Some(formula.clone()),
            });
        }
    }
    out
}

pub(crate) fn diff_notes(old: &Sheet, new: &Sheet) -> Vec<NoteChange> {
    let cells: BTreeSet<CellRef> = old.notes.keys().chain(new.notes.keys()).copied().collect();
    cells
        .into_iter()
        .filter(|cell| old.notes.get(cell) != new.notes.get(cell))
        .map(|cell| NoteChange {
            cell,
            note: new.notes.get(&cell).cloned(),
        })
        .collect()
}

pub(crate) fn diff_text_runs(old: &Sheet, new: &Sheet) -> Vec<TextRunChange> {
    let cells: BTreeSet<CellRef> = old
        .text_runs
        .keys()
        .chain(new.text_runs.keys())
        .copied()
        .collect();
    cells
        .into_iter()
        .filter(|cell| old.text_runs.get(cell) != new.text_runs.get(cell))
        .map(|cell| TextRunChange {
            cell,
            runs: new.text_runs.get(&cell).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Pivot tables are identified by their anchor cell, so a new anchor is an
/// addition rather than an unresolved id.
pub(crate) fn diff_pivot_tables(old: &Sheet, new: &Sheet) -> EntityChanges<PivotTable> {
    let before: BTreeMap<CellRef, &PivotTable> =
        old.pivot_tables.iter().map(|p| (p.anchor_cell, p)).collect();
    let after: BTreeMap<CellRef, &PivotTable> =
        new.pivot_tables.iter().map(|p| (p.anchor_cell, p)).collect();

    let mut changes = EntityChanges::default();
    for (anchor, pivot) in &after {
        match before.get(anchor) {
            None => changes.added.push((*pivot).clone()),
            Some(old) if old != pivot => changes.updated.push(((*old).clone(), (*pivot).clone())),
            Some(_) => {}
        }
    }
    for (anchor, pivot) in &before {
        if !after.contains_key(anchor) {
            changes.removed.push((*pivot).clone());
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use extrasheet_model::{GridProperties, SheetProperties};
    use pretty_assertions::assert_eq;

    fn sheet() -> Sheet {
        Sheet::new(SheetProperties {
            sheet_id: Some(0),
            title: "Sheet1".into(),
            index: 0,
            folder: "Sheet1".into(),
            grid_properties: GridProperties {
                row_count: 100,
                column_count: 26,
                ..GridProperties::default()
            },
            hidden: false,
            tab_color: None,
            right_to_left: false,
            extra: Default::default(),
        })
    }

    fn cell(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    #[test]
    fn formula_wins_over_cached_value() {
        let mut old = sheet();
        old.formulas.insert(cell("C1"), "=A1+B1".into());
        old.values.insert(cell("C1"), CellValue::Number(3.0));
        let mut new = old.clone();
        new.values.insert(cell("C1"), CellValue::Number(99.0));

        assert!(diff_content(&old, &new).cells.is_empty());

        new.formulas.insert(cell("C1"), "=A1*B1".into());
        let diff = diff_content(&old, &new);
        assert_eq!(diff.cells.len(), 1);
        assert_eq!(diff.cells[0].new, CellContent::Formula("=A1*B1".into()));
        assert_eq!(diff.cells[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn array_output_values_are_cached() {
        let mut old = sheet();
        let range = Range::from_a1("A1:A3").unwrap();
        old.array_formulas.insert(range, "=SEQUENCE(3)".into());
        let mut new = old.clone();
        new.values.insert(cell("A2"), CellValue::Number(5.0));
        let diff = diff_content(&old, &new);
        assert!(diff.cells.is_empty());
        assert!(diff.array_formulas.is_empty());
    }

    #[test]
    fn new_array_clears_typed_spill_cells() {
        let mut old = sheet();
        old.values.insert(cell("A2"), CellValue::from("typed"));
        let mut new = old.clone();
        new.array_formulas
            .insert(Range::from_a1("A1:A3").unwrap(), "=SEQUENCE(3)".into());

        let diff = diff_content(&old, &new);
        assert_eq!(diff.cells.len(), 1);
        assert_eq!(diff.cells[0].cell, cell("A2"));
        assert_eq!(diff.cells[0].kind, ChangeKind::Removed);
        assert_eq!(diff.array_formulas.len(), 1);
    }

    #[test]
    fn uniform_new_formulas_become_one_range() {
        let old = sheet();
        let mut new = sheet();
        for row in 2..=6 {
            new.formulas
                .insert(cell(&format!("D{row}")), format!("=C{row}*2"));
        }
        new.formulas.insert(cell("F1"), "=SUM(D2:D6)".into());

        let diff = diff_content(&old, &new);
        assert_eq!(
            diff.formula_ranges,
            vec![FormulaRangeChange {
                range: Range::from_a1("D2:D6").unwrap(),
                formula: "=C2*2".into(),
            }]
        );
        assert_eq!(diff.cells.len(), 1);
        assert_eq!(diff.cells[0].cell, cell("F1"));
    }

    #[test]
    fn pivots_match_by_anchor() {
        let mut old = sheet();
        old.pivot_tables.push(PivotTable {
            anchor_cell: cell("H1"),
            pivot_table: serde_json::json!({"rows": []}),
        });
        let mut new = sheet();
        new.pivot_tables.push(PivotTable {
            anchor_cell: cell("J1"),
            pivot_table: serde_json::json!({"rows": []}),
        });
        let changes = diff_pivot_tables(&old, &new);
        assert_eq!(changes.added[0].anchor_cell, cell("J1"));
        assert_eq!(changes.removed[0].anchor_cell, cell("H1"));
    }
}
