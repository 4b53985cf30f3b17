//! Turns a [`DiffResult`] into an ordered `batchUpdate` request list.
//!
//! Requests are emitted in phases so that each one only refers to objects
//! that exist at that point of the batch: spreadsheet properties, new sheets,
//! sheet properties, cell content, formatting, feature additions and updates,
//! feature deletions (reverse dependency order), and finally sheet deletions.

mod request;
mod validation;

use std::collections::BTreeMap;

use serde_json::{json, Value as JsonValue};

use extrasheet_model::{
    cover_rectangles, CellRef, CellValue, CfRuleId, Dimension, Entity, ErrorCode, GridRange,
    Range, Sheet, Spreadsheet,
};

use crate::diff::{
    BasicFilterChange, CellContent, ConditionalFormatChanges, DiffResult, EntityChanges,
    FormulaRangeChange, GroupChanges, SheetChange, SheetDiff,
};

pub use request::{Request, RowData, SourceAndDestination};

const USER_ENTERED_VALUE: &str = "userEnteredValue";
const ALL_FIELDS: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{sheet}!{range}: data validation condition {condition} is not supported")]
    UnsupportedValidation {
        sheet: String,
        range: Range,
        condition: String,
    },

    #[error("{sheet}!{range}: {condition} takes {expected} value(s), found {actual}")]
    ValidationArity {
        sheet: String,
        range: Range,
        condition: String,
        expected: String,
        actual: usize,
    },

    #[error("{sheet}!{cell}: error value {code} cannot be written")]
    ErrorValue {
        sheet: String,
        cell: CellRef,
        code: ErrorCode,
    },

    #[error("{sheet}: {kind} {id} is not in the pristine snapshot; re-fetch required")]
    UnresolvedEntity {
        sheet: String,
        kind: &'static str,
        id: String,
    },
}

/// Ordered requests for one `batchUpdate` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestPlan {
    pub requests: Vec<Request>,
}

impl RequestPlan {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// The `batchUpdate` request body.
    pub fn body(&self) -> JsonValue {
        json!({ "requests": JsonValue::Array(self.requests.iter().map(Request::to_json).collect()) })
    }

    /// Number of requests per request kind.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for request in &self.requests {
            *counts.entry(request.kind()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Default)]
struct Phases {
    properties: Vec<Request>,
    sheet_adds: Vec<Request>,
    sheet_updates: Vec<Request>,
    content: Vec<Request>,
    formatting: Vec<Request>,
    upserts: Vec<Request>,
    deletes: Vec<Request>,
    sheet_deletes: Vec<Request>,
}

impl Phases {
    fn into_plan(self) -> RequestPlan {
        let requests = [
            self.properties,
            self.sheet_adds,
            self.sheet_updates,
            self.content,
            self.formatting,
            self.upserts,
            self.deletes,
            self.sheet_deletes,
        ]
        .into_iter()
        .flatten()
        .collect();
        RequestPlan { requests }
    }
}

/// Generates requests for a diff between `pristine` and `current`.
///
/// `pristine` supplies the live positions of conditional format rules;
/// `current` supplies cell strings that rich text runs apply to.
pub struct RequestGenerator<'a> {
    pristine: &'a Spreadsheet,
    current: &'a Spreadsheet,
}

impl<'a> RequestGenerator<'a> {
    pub fn new(pristine: &'a Spreadsheet, current: &'a Spreadsheet) -> Self {
        Self { pristine, current }
    }

    pub fn generate(&self, diff: &DiffResult) -> Result<RequestPlan, RequestError> {
        let mut phases = Phases::default();

        if let Some(change) = &diff.properties {
            phases.properties.push(Request::UpdateSpreadsheetProperties {
                properties: change.properties.to_wire(),
                fields: change.fields.join(","),
            });
        }

        for change in &diff.sheets {
            match change {
                SheetChange::Added {
                    sheet_id,
                    properties,
                } => phases.sheet_adds.push(Request::AddSheet {
                    properties: properties.to_wire(*sheet_id),
                }),
                SheetChange::Updated {
                    sheet_id,
                    fields,
                    properties,
                } => phases.sheet_updates.push(Request::UpdateSheetProperties {
                    properties: properties.to_wire(*sheet_id),
                    fields: fields.join(","),
                }),
                SheetChange::Removed { sheet_id, title } => {
                    log::debug!("sheet {title:?} ({sheet_id}) will be deleted");
                    phases
                        .sheet_deletes
                        .push(Request::DeleteSheet { sheet_id: *sheet_id });
                }
            }
        }

        upsert_entities(
            &diff.named_ranges,
            &mut phases.upserts,
            |named| Request::AddNamedRange {
                named_range: named.to_wire(),
            },
            |_, named, out| {
                out.push(Request::UpdateNamedRange {
                    named_range: named.to_wire(),
                    fields: ALL_FIELDS.to_string(),
                })
            },
        );

        for sheet in &diff.sheet_diffs {
            self.content(sheet, &mut phases.content)?;
            self.formatting(sheet, &mut phases.formatting)?;
            feature_upserts(sheet, &mut phases.upserts);
            feature_deletes(sheet, &mut phases.deletes);
        }

        delete_entities(&diff.named_ranges, &mut phases.deletes, |id| {
            Request::DeleteNamedRange { named_range_id: id }
        });

        let plan = phases.into_plan();
        log::debug!("generated {} requests", plan.len());
        Ok(plan)
    }

    fn content(&self, diff: &SheetDiff, out: &mut Vec<Request>) -> Result<(), RequestError> {
        let sheet_id = diff.sheet_id;

        // A removed array formula is cleared at its anchor before anything
        // is written into its former output range.
        for change in diff.array_formulas.iter().filter(|c| c.formula.is_none()) {
            out.push(update_cell(
                sheet_id,
                change.range.start,
                json!({}),
                USER_ENTERED_VALUE,
            ));
        }

        cell_writes(diff, out)?;

        for change in &diff.formula_ranges {
            formula_range(sheet_id, change, out);
        }

        for change in &diff.array_formulas {
            if let Some(formula) = &change.formula {
                out.push(update_cell(
                    sheet_id,
                    change.range.start,
                    formula_cell(formula),
                    USER_ENTERED_VALUE,
                ));
            }
        }

        for change in &diff.notes {
            let cell = match &change.note {
                Some(note) => json!({ "note": note }),
                None => json!({}),
            };
            out.push(update_cell(sheet_id, change.cell, cell, "note"));
        }

        for change in &diff.text_runs {
            if change.runs.is_empty() {
                out.push(update_cell(sheet_id, change.cell, json!({}), "textFormatRuns"));
                continue;
            }
            let runs: Vec<JsonValue> = change.runs.iter().map(|run| run.to_wire()).collect();
            // Runs index into the cell's string, so the string travels with them.
            match self.current_string(&diff.title, change.cell) {
                Some(text) => out.push(update_cell(
                    sheet_id,
                    change.cell,
                    json!({ "userEnteredValue": { "stringValue": text }, "textFormatRuns": runs }),
                    "userEnteredValue,textFormatRuns",
                )),
                None => out.push(update_cell(
                    sheet_id,
                    change.cell,
                    json!({ "textFormatRuns": runs }),
                    "textFormatRuns",
                )),
            }
        }

        let pivots = &diff.pivot_tables;
        for pivot in pivots.added.iter().chain(pivots.updated.iter().map(|(_, new)| new)) {
            out.push(update_cell(
                sheet_id,
                pivot.anchor_cell,
                json!({ "pivotTable": pivot.pivot_table }),
                "pivotTable",
            ));
        }
        for pivot in &pivots.removed {
            out.push(update_cell(sheet_id, pivot.anchor_cell, json!({}), "pivotTable"));
        }
        Ok(())
    }

    fn current_string(&self, title: &str, cell: CellRef) -> Option<&'a str> {
        let sheet = self.current.sheet_by_title(title)?;
        if sheet.formula_at(cell).is_some() {
            return None;
        }
        match sheet.value_at(cell) {
            CellValue::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn formatting(&self, diff: &SheetDiff, out: &mut Vec<Request>) -> Result<(), RequestError> {
        let sheet_id = diff.sheet_id;

        for range in &diff.merges.removed {
            out.push(Request::UnmergeCells {
                range: range.to_grid_range(sheet_id),
            });
        }
        for range in &diff.merges.added {
            out.push(Request::MergeCells {
                range: range.to_grid_range(sheet_id),
                merge_type: "MERGE_ALL".to_string(),
            });
        }

        for change in &diff.formats {
            let cell = if change.format.is_empty() {
                json!({})
            } else {
                json!({ "userEnteredFormat": change.format.to_wire() })
            };
            out.push(Request::RepeatCell {
                range: change.range.to_grid_range(sheet_id),
                cell,
                fields: "userEnteredFormat".to_string(),
            });
        }

        self.conditional_formats(diff, out)?;

        for change in diff.row_metadata.iter().chain(&diff.column_metadata) {
            let (properties, fields) = change.props.to_wire(change.span.dimension);
            out.push(Request::UpdateDimensionProperties {
                range: change.span.to_dimension_range(sheet_id),
                properties,
                fields: fields.to_string(),
            });
        }

        dimension_groups(sheet_id, &diff.row_groups, out);
        dimension_groups(sheet_id, &diff.column_groups, out);

        for change in &diff.data_validation {
            let rule = match &change.rule {
                Some(rule) => {
                    validation::check_validation_rule(&diff.title, change.range, rule)?;
                    Some(rule.to_wire())
                }
                None => None,
            };
            out.push(Request::SetDataValidation {
                range: change.range.to_grid_range(sheet_id),
                rule,
            });
        }
        Ok(())
    }

    /// Rule requests address rules by their index in the live list, so the
    /// list is simulated as requests are emitted: deletions from the back,
    /// then moves into the final survivor order, updates in place, and
    /// insertions at their final positions in ascending order.
    fn conditional_formats(
        &self,
        diff: &SheetDiff,
        out: &mut Vec<Request>,
    ) -> Result<(), RequestError> {
        let changes: &ConditionalFormatChanges = &diff.conditional_formats;
        if changes.is_empty() {
            return Ok(());
        }
        let sheet_id = diff.sheet_id;
        let mut live: Vec<CfRuleId> = self
            .pristine
            .sheet_by_id(sheet_id)
            .map(Sheet::conditional_format_ids)
            .unwrap_or_default();

        let position = |live: &[CfRuleId], id: CfRuleId| {
            live.iter()
                .position(|candidate| *candidate == id)
                .ok_or_else(|| RequestError::UnresolvedEntity {
                    sheet: diff.title.clone(),
                    kind: "conditional format rule",
                    id: id.to_string(),
                })
        };

        let mut removals = changes
            .removed
            .iter()
            .map(|id| position(&live, *id))
            .collect::<Result<Vec<_>, _>>()?;
        removals.sort_unstable_by(|a, b| b.cmp(a));
        for index in removals {
            out.push(Request::DeleteConditionalFormatRule { index, sheet_id });
            live.remove(index);
        }

        if let Some(order) = &changes.reordered {
            for (target, id) in order.iter().enumerate() {
                let index = position(&live, *id)?;
                if index != target {
                    out.push(Request::UpdateConditionalFormatRule {
                        index,
                        sheet_id,
                        rule: None,
                        new_index: Some(target),
                    });
                    let moved = live.remove(index);
                    live.insert(target, moved);
                }
            }
        }

        for (id, rule) in &changes.updated {
            out.push(Request::UpdateConditionalFormatRule {
                index: position(&live, *id)?,
                sheet_id,
                rule: Some(rule.to_wire(sheet_id)),
                new_index: None,
            });
        }

        let mut added: Vec<_> = changes.added.iter().collect();
        added.sort_by_key(|(index, _)| *index);
        for (index, rule) in added {
            out.push(Request::AddConditionalFormatRule {
                rule: rule.to_wire(sheet_id),
                index: *index,
            });
        }
        Ok(())
    }
}

fn update_cell(sheet_id: u32, cell: CellRef, data: JsonValue, fields: &str) -> Request {
    Request::UpdateCells {
        range: Range::cell(cell).to_grid_range(sheet_id),
        rows: vec![RowData { values: vec![data] }],
        fields: fields.to_string(),
    }
}

fn formula_cell(formula: &str) -> JsonValue {
    json!({ "userEnteredValue": { "formulaValue": formula } })
}

fn cell_data(content: &CellContent) -> JsonValue {
    match content {
        CellContent::Formula(formula) => formula_cell(formula),
        CellContent::Value(value) => match value.to_wire() {
            Some(wire) => json!({ "userEnteredValue": wire }),
            None => json!({}),
        },
    }
}

/// Changed cells are batched into rectangles, one `updateCells` each.
fn cell_writes(diff: &SheetDiff, out: &mut Vec<Request>) -> Result<(), RequestError> {
    let mut by_cell: BTreeMap<CellRef, &CellContent> = BTreeMap::new();
    for change in &diff.cells {
        if let CellContent::Value(CellValue::Error(code)) = &change.new {
            return Err(RequestError::ErrorValue {
                sheet: diff.title.clone(),
                cell: change.cell,
                code: *code,
            });
        }
        by_cell.insert(change.cell, &change.new);
    }

    let mask: BTreeMap<CellRef, ()> = by_cell.keys().map(|cell| (*cell, ())).collect();
    for (range, ()) in cover_rectangles(&mask) {
        let rows = (range.start.row..=range.end.row)
            .map(|row| RowData {
                values: (range.start.col..=range.end.col)
                    .map(|col| {
                        by_cell
                            .get(&CellRef::new(row, col))
                            .map_or_else(|| json!({}), |content| cell_data(content))
                    })
                    .collect(),
            })
            .collect();
        out.push(Request::UpdateCells {
            range: range.to_grid_range(diff.sheet_id),
            rows,
            fields: USER_ENTERED_VALUE.to_string(),
        });
    }
    Ok(())
}

/// The anchor formula is written once and auto-filled over the rest of the
/// range: down a column, across a row, or across the first row and then down.
fn formula_range(sheet_id: u32, change: &FormulaRangeChange, out: &mut Vec<Request>) {
    let range = change.range;
    let anchor = range.start;
    out.push(update_cell(
        sheet_id,
        anchor,
        formula_cell(&change.formula),
        USER_ENTERED_VALUE,
    ));

    let fill = |source: GridRange, dimension: Dimension, fill_length: u32| Request::AutoFill {
        source_and_destination: SourceAndDestination {
            source,
            dimension,
            fill_length,
        },
        use_alternate_series: false,
    };
    if range.width() > 1 {
        out.push(fill(
            Range::cell(anchor).to_grid_range(sheet_id),
            Dimension::Columns,
            range.width() - 1,
        ));
    }
    if range.height() > 1 {
        let first_row = Range::new(anchor, CellRef::new(anchor.row, range.end.col));
        out.push(fill(
            first_row.to_grid_range(sheet_id),
            Dimension::Rows,
            range.height() - 1,
        ));
    }
}

/// Deeper groups are removed first and shallower groups added first; the
/// collapsed state of new groups is applied once they exist.
fn dimension_groups(sheet_id: u32, changes: &GroupChanges, out: &mut Vec<Request>) {
    let mut removed: Vec<_> = changes.removed.iter().collect();
    removed.sort_by(|a, b| b.depth.cmp(&a.depth));
    for group in removed {
        out.push(Request::DeleteDimensionGroup {
            range: group.span.to_dimension_range(sheet_id),
        });
    }

    let mut added: Vec<_> = changes.added.iter().collect();
    added.sort_by_key(|group| group.depth);
    for group in &added {
        out.push(Request::AddDimensionGroup {
            range: group.span.to_dimension_range(sheet_id),
        });
    }

    let collapsed_new = added.into_iter().filter(|group| group.collapsed);
    for group in collapsed_new.chain(&changes.updated) {
        out.push(Request::UpdateDimensionGroup {
            dimension_group: json!({
                "range": group.span.to_dimension_range(sheet_id),
                "depth": group.depth,
                "collapsed": group.collapsed,
            }),
            fields: "collapsed".to_string(),
        });
    }
}

fn upsert_entities<T: Entity>(
    changes: &EntityChanges<T>,
    out: &mut Vec<Request>,
    add: impl Fn(&T) -> Request,
    update: impl Fn(&T, &T, &mut Vec<Request>),
) {
    out.extend(changes.added.iter().map(add));
    for (old, new) in &changes.updated {
        update(old, new, out);
    }
}

fn delete_entities<T: Entity>(
    changes: &EntityChanges<T>,
    out: &mut Vec<Request>,
    delete: impl Fn(T::Id) -> Request,
) {
    out.extend(changes.removed.iter().filter_map(|entity| entity.id()).map(delete));
}

fn reposition(object_id: i64, old: &Option<JsonValue>, new: &Option<JsonValue>) -> Option<Request> {
    match new {
        Some(position) if old != new => Some(Request::UpdateEmbeddedObjectPosition {
            object_id,
            new_position: position.clone(),
            fields: ALL_FIELDS.to_string(),
        }),
        _ => None,
    }
}

fn feature_upserts(diff: &SheetDiff, out: &mut Vec<Request>) {
    let sheet_id = diff.sheet_id;
    let title = diff.title.as_str();

    upsert_entities(
        &diff.charts,
        out,
        |chart| Request::AddChart {
            chart: chart.to_wire(sheet_id),
        },
        |old, new, out| {
            let Some(chart_id) = new.chart_id else { return };
            if old.spec != new.spec {
                out.push(Request::UpdateChartSpec {
                    chart_id,
                    spec: new.spec.clone(),
                });
            }
            out.extend(reposition(chart_id, &old.position, &new.position));
            if old.extra != new.extra {
                log::warn!("{title}: chart {chart_id} has edits outside spec and position; not pushed");
            }
        },
    );

    upsert_entities(
        &diff.tables,
        out,
        |table| Request::AddTable {
            table: table.to_wire(sheet_id),
        },
        |_, table, out| {
            out.push(Request::UpdateTable {
                table: table.to_wire(sheet_id),
                fields: ALL_FIELDS.to_string(),
            })
        },
    );

    if let Some(BasicFilterChange::Set(filter)) = &diff.basic_filter {
        out.push(Request::SetBasicFilter {
            filter: filter.to_wire(sheet_id),
        });
    }

    upsert_entities(
        &diff.filter_views,
        out,
        |view| Request::AddFilterView {
            filter: view.to_wire(sheet_id),
        },
        |_, view, out| {
            out.push(Request::UpdateFilterView {
                filter: view.to_wire(sheet_id),
                fields: ALL_FIELDS.to_string(),
            })
        },
    );

    upsert_entities(
        &diff.banded_ranges,
        out,
        |banded| Request::AddBanding {
            banded_range: banded.to_wire(sheet_id),
        },
        |_, banded, out| {
            out.push(Request::UpdateBanding {
                banded_range: banded.to_wire(sheet_id),
                fields: ALL_FIELDS.to_string(),
            })
        },
    );

    upsert_entities(
        &diff.slicers,
        out,
        |slicer| Request::AddSlicer {
            slicer: slicer.to_wire(sheet_id),
        },
        |old, new, out| {
            let Some(slicer_id) = new.slicer_id else { return };
            if old.spec != new.spec {
                out.push(Request::UpdateSlicerSpec {
                    slicer_id,
                    spec: new.spec.clone(),
                    fields: ALL_FIELDS.to_string(),
                });
            }
            out.extend(reposition(slicer_id, &old.position, &new.position));
        },
    );

    upsert_entities(
        &diff.protected_ranges,
        out,
        |protected| Request::AddProtectedRange {
            protected_range: protected.to_wire(sheet_id),
        },
        |_, protected, out| {
            out.push(Request::UpdateProtectedRange {
                protected_range: protected.to_wire(sheet_id),
                fields: ALL_FIELDS.to_string(),
            })
        },
    );
}

fn feature_deletes(diff: &SheetDiff, out: &mut Vec<Request>) {
    delete_entities(&diff.protected_ranges, out, |id| {
        Request::DeleteProtectedRange {
            protected_range_id: id,
        }
    });
    delete_entities(&diff.slicers, out, |id| Request::DeleteEmbeddedObject {
        object_id: id,
    });
    delete_entities(&diff.banded_ranges, out, |id| Request::DeleteBanding {
        banded_range_id: id,
    });
    delete_entities(&diff.filter_views, out, |id| Request::DeleteFilterView {
        filter_id: id,
    });
    if let Some(BasicFilterChange::Cleared) = &diff.basic_filter {
        out.push(Request::ClearBasicFilter {
            sheet_id: diff.sheet_id,
        });
    }
    delete_entities(&diff.tables, out, |id| Request::DeleteTable { table_id: id });
    delete_entities(&diff.charts, out, |id| Request::DeleteEmbeddedObject {
        object_id: id,
    });
}
