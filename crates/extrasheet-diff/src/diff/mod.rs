//! Declarative diff between a pristine snapshot and the current folder.
//!
//! The engine compares two complete states and reports what differs, layer
//! by layer. It never infers row or column insertion: any change in grid
//! shape on a sheet present in both states is rejected.

mod cells;
mod entities;
mod layout;

use std::collections::BTreeSet;
use std::fmt;

use extrasheet_fs::{FsError, SnapshotHandle, SnapshotStore};
use extrasheet_model::{
    decode, BandedRange, BasicFilter, CellRef, Chart, CodecError, Dimension, FilterView,
    NamedRange, PivotTable, ProtectedRange, Sheet, SheetProperties, Slicer, Spreadsheet,
    SpreadsheetProperties, Table,
};

pub use cells::{
    ArrayFormulaChange, CellChange, CellContent, ChangeKind, FormulaRangeChange, NoteChange,
    TextRunChange,
};
pub use entities::EntityChanges;
pub use layout::{
    ConditionalFormatChanges, DimensionChange, FormatChange, GroupChanges, MergeChanges,
    ValidationChange,
};

/// Grid size of a sheet as seen by the diff: manifest dimensions and the
/// extent of `data.tsv`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub row_count: u32,
    pub column_count: u32,
    pub data_rows: u32,
    pub data_columns: u32,
}

impl GridShape {
    fn of(sheet: &Sheet) -> Self {
        let (row_count, column_count) = sheet.grid_shape();
        let extent = sheet.occupied_extent();
        Self {
            row_count,
            column_count,
            data_rows: extent.rows,
            data_columns: extent.cols,
        }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} grid, {}x{} data",
            self.row_count, self.column_count, self.data_rows, self.data_columns
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "sheet {sheet:?} changed shape ({pristine} -> {current}); inserting or deleting rows and \
     columns is not supported, re-fetch and edit within the existing grid"
)]
pub struct GridDimensionChangedError {
    pub sheet: String,
    pub pristine: GridShape,
    pub current: GridShape,
}

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    GridDimensionChanged(#[from] GridDimensionChangedError),

    #[error("{sheet}: {kind} {id} is not in the pristine snapshot; re-fetch required")]
    UnresolvedEntity {
        sheet: String,
        kind: &'static str,
        id: String,
    },

    #[error("{sheet}: cell {cell} belongs to more than one data validation group")]
    OverlappingValidation { sheet: String, cell: CellRef },

    #[error("snapshot {digest} has already been pushed; re-fetch before diffing")]
    StaleSnapshot { digest: String },

    #[error("loading pristine snapshot: {0}")]
    Snapshot(#[from] FsError),

    #[error("decoding pristine snapshot: {0}")]
    Codec(#[from] CodecError),
}

/// Diff-time switches.
#[derive(Clone, Debug, Default)]
pub struct DiffOptions {
    /// Diff against a snapshot that a previous push was already based on.
    pub allow_stale: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertiesChange {
    pub fields: Vec<&'static str>,
    pub properties: SpreadsheetProperties,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SheetChange {
    /// A sheet created locally; `sheet_id` is allocated by the diff so later
    /// requests can address it.
    Added {
        sheet_id: u32,
        properties: SheetProperties,
    },
    Updated {
        sheet_id: u32,
        fields: Vec<&'static str>,
        properties: SheetProperties,
    },
    Removed {
        sheet_id: u32,
        title: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum BasicFilterChange {
    Set(BasicFilter),
    Cleared,
}

/// Every change within one sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetDiff {
    pub sheet_id: u32,
    pub title: String,
    pub cells: Vec<CellChange>,
    pub formula_ranges: Vec<FormulaRangeChange>,
    pub array_formulas: Vec<ArrayFormulaChange>,
    pub notes: Vec<NoteChange>,
    pub text_runs: Vec<TextRunChange>,
    pub pivot_tables: EntityChanges<PivotTable>,
    pub formats: Vec<FormatChange>,
    pub merges: MergeChanges,
    pub conditional_formats: ConditionalFormatChanges,
    pub row_metadata: Vec<DimensionChange>,
    pub column_metadata: Vec<DimensionChange>,
    pub row_groups: GroupChanges,
    pub column_groups: GroupChanges,
    pub data_validation: Vec<ValidationChange>,
    pub charts: EntityChanges<Chart>,
    pub tables: EntityChanges<Table>,
    pub basic_filter: Option<BasicFilterChange>,
    pub filter_views: EntityChanges<FilterView>,
    pub banded_ranges: EntityChanges<BandedRange>,
    pub slicers: EntityChanges<Slicer>,
    pub protected_ranges: EntityChanges<ProtectedRange>,
}

impl SheetDiff {
    /// Per-layer change counts, in a fixed order.
    pub fn counts(&self) -> [(&'static str, usize); 21] {
        [
            ("cells", self.cells.len()),
            ("formula ranges", self.formula_ranges.len()),
            ("array formulas", self.array_formulas.len()),
            ("notes", self.notes.len()),
            ("text runs", self.text_runs.len()),
            ("pivot tables", self.pivot_tables.len()),
            ("formats", self.formats.len()),
            ("merges", self.merges.added.len() + self.merges.removed.len()),
            ("conditional formats", self.conditional_formats.len()),
            ("row metadata", self.row_metadata.len()),
            ("column metadata", self.column_metadata.len()),
            ("row groups", self.row_groups.len()),
            ("column groups", self.column_groups.len()),
            ("data validation", self.data_validation.len()),
            ("charts", self.charts.len()),
            ("tables", self.tables.len()),
            ("basic filter", usize::from(self.basic_filter.is_some())),
            ("filter views", self.filter_views.len()),
            ("banded ranges", self.banded_ranges.len()),
            ("slicers", self.slicers.len()),
            ("protected ranges", self.protected_ranges.len()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|(_, n)| *n == 0)
    }
}

/// Unordered set of typed changes between two states.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffResult {
    pub properties: Option<PropertiesChange>,
    pub sheets: Vec<SheetChange>,
    /// One entry per current sheet with content changes, in manifest order.
    pub sheet_diffs: Vec<SheetDiff>,
    pub named_ranges: EntityChanges<NamedRange>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.properties.is_none()
            && self.sheets.is_empty()
            && self.sheet_diffs.is_empty()
            && self.named_ranges.is_empty()
    }

    /// Total change counts per layer across all sheets, skipping zeros.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut totals: Vec<(&'static str, usize)> = vec![
            ("spreadsheet properties", usize::from(self.properties.is_some())),
            ("sheets", self.sheets.len()),
            ("named ranges", self.named_ranges.len()),
        ];
        for diff in &self.sheet_diffs {
            for (layer, n) in diff.counts() {
                match totals.iter_mut().find(|(name, _)| *name == layer) {
                    Some((_, total)) => *total += n,
                    None => totals.push((layer, n)),
                }
            }
        }
        totals.retain(|(_, n)| *n > 0);
        totals
    }
}

/// Compares folder states against one pristine baseline.
#[derive(Debug)]
pub struct DiffEngine {
    pristine: Spreadsheet,
}

impl DiffEngine {
    pub fn new(pristine: Spreadsheet) -> Self {
        Self { pristine }
    }

    /// Load the baseline from a captured snapshot, refusing a stale one.
    pub fn from_snapshot(
        store: &SnapshotStore,
        handle: &SnapshotHandle,
    ) -> Result<Self, DiffError> {
        Self::from_snapshot_with_options(store, handle, &DiffOptions::default())
    }

    pub fn from_snapshot_with_options(
        store: &SnapshotStore,
        handle: &SnapshotHandle,
        options: &DiffOptions,
    ) -> Result<Self, DiffError> {
        if let Some(marker) = store.stale_marker()? {
            if options.allow_stale {
                log::warn!(
                    "diffing against snapshot {handle}, which push {} already used",
                    marker.pushed_from
                );
            } else {
                return Err(DiffError::StaleSnapshot {
                    digest: marker.pushed_from,
                });
            }
        }
        let tree = store.restore(handle)?;
        let pristine = decode(&tree)?;
        log::debug!(
            "loaded pristine snapshot {handle} ({} sheets)",
            pristine.sheets.len()
        );
        Ok(Self::new(pristine))
    }

    pub fn pristine(&self) -> &Spreadsheet {
        &self.pristine
    }

    pub fn diff(&self, current: &Spreadsheet) -> Result<DiffResult, DiffError> {
        let pristine = &self.pristine;
        for sheet in &current.sheets {
            let Some(id) = sheet.id() else { continue };
            let Some(old) = pristine.sheet_by_id(id) else {
                return Err(DiffError::UnresolvedEntity {
                    sheet: sheet.title().to_string(),
                    kind: "sheet",
                    id: id.to_string(),
                });
            };
            let (before, after) = (GridShape::of(old), GridShape::of(sheet));
            if before != after {
                return Err(GridDimensionChangedError {
                    sheet: sheet.title().to_string(),
                    pristine: before,
                    current: after,
                }
                .into());
            }
        }

        let mut result = DiffResult::default();

        let fields = pristine.properties.changed_fields(&current.properties);
        if !fields.is_empty() {
            result.properties = Some(PropertiesChange {
                fields,
                properties: current.properties.clone(),
            });
        }

        let mut next_id = pristine
            .sheets
            .iter()
            .chain(&current.sheets)
            .filter_map(Sheet::id)
            .max()
            .map_or(0, |max| max + 1);

        for sheet in &current.sheets {
            let empty;
            let existing = sheet
                .id()
                .and_then(|id| pristine.sheet_by_id(id).map(|old| (id, old)));
            let (sheet_id, baseline) = match existing {
                Some((id, old)) => {
                    let fields = old.properties.changed_fields(&sheet.properties);
                    if !fields.is_empty() {
                        result.sheets.push(SheetChange::Updated {
                            sheet_id: id,
                            fields,
                            properties: sheet.properties.clone(),
                        });
                    }
                    (id, old)
                }
                None => {
                    let id = next_id;
                    next_id += 1;
                    log::debug!("new sheet {:?} will be created as sheet {id}", sheet.title());
                    result.sheets.push(SheetChange::Added {
                        sheet_id: id,
                        properties: sheet.properties.clone(),
                    });
                    empty = Sheet::new(sheet.properties.clone());
                    (id, &empty)
                }
            };

            let diff = diff_sheet(sheet_id, baseline, sheet)?;
            if !diff.is_empty() {
                result.sheet_diffs.push(diff);
            }
        }

        for old in &pristine.sheets {
            let Some(id) = old.id() else { continue };
            if current.sheet_by_id(id).is_none() {
                result.sheets.push(SheetChange::Removed {
                    sheet_id: id,
                    title: old.title().to_string(),
                });
            }
        }

        result.named_ranges = entities::diff_entities(
            "named_ranges.json",
            &pristine.named_ranges,
            &current.named_ranges,
        )?;
        check_named_range_references(pristine, current)?;

        Ok(result)
    }
}

/// Protected ranges may only reference named ranges that already exist
/// remotely; a new named range has no id until it is pushed.
fn check_named_range_references(
    pristine: &Spreadsheet,
    current: &Spreadsheet,
) -> Result<(), DiffError> {
    let assigned: BTreeSet<&str> = pristine
        .named_ranges
        .iter()
        .filter_map(|n| n.named_range_id.as_deref())
        .collect();
    for sheet in &current.sheets {
        for protected in &sheet.protected_ranges {
            if let Some(id) = protected.named_range_id.as_deref() {
                if !assigned.contains(id) {
                    return Err(DiffError::UnresolvedEntity {
                        sheet: sheet.title().to_string(),
                        kind: "named range",
                        id: id.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn diff_sheet(sheet_id: u32, old: &Sheet, new: &Sheet) -> Result<SheetDiff, DiffError> {
    let title = new.title();
    let content = cells::diff_content(old, new);

    let basic_filter = match (&old.basic_filter, &new.basic_filter) {
        (a, b) if a == b => None,
        (_, Some(filter)) => Some(BasicFilterChange::Set(filter.clone())),
        (Some(_), None) => Some(BasicFilterChange::Cleared),
        (None, None) => None,
    };

    Ok(SheetDiff {
        sheet_id,
        title: title.to_string(),
        cells: content.cells,
        formula_ranges: content.formula_ranges,
        array_formulas: content.array_formulas,
        notes: cells::diff_notes(old, new),
        text_runs: cells::diff_text_runs(old, new),
        pivot_tables: cells::diff_pivot_tables(old, new),
        formats: layout::diff_formats(old, new),
        merges: layout::diff_merges(old, new),
        conditional_formats: layout::diff_conditional_formats(old, new)?,
        row_metadata: layout::diff_dimension_metadata(
            Dimension::Rows,
            &old.row_metadata,
            &new.row_metadata,
        ),
        column_metadata: layout::diff_dimension_metadata(
            Dimension::Columns,
            &old.column_metadata,
            &new.column_metadata,
        ),
        row_groups: layout::diff_groups(&old.row_groups, &new.row_groups),
        column_groups: layout::diff_groups(&old.column_groups, &new.column_groups),
        data_validation: layout::diff_validation(old, new)?,
        charts: entities::diff_entities(title, &old.charts, &new.charts)?,
        tables: entities::diff_entities(title, &old.tables, &new.tables)?,
        basic_filter,
        filter_views: entities::diff_entities(title, &old.filter_views, &new.filter_views)?,
        banded_ranges: entities::diff_entities(title, &old.banded_ranges, &new.banded_ranges)?,
        slicers: entities::diff_entities(title, &old.slicers, &new.slicers)?,
        protected_ranges: entities::diff_entities(
            title,
            &old.protected_ranges,
            &new.protected_ranges,
        )?,
    })
}
