//! Decoding and encoding between a [`FileTree`] and a [`Spreadsheet`].

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::dimensions::{
    compress_metadata, expand_metadata, group_entries, parse_groups, DimensionsFile,
};
use crate::file_tree::join;
use crate::{
    compress_formulas, tsv, validation_by_cell, A1ParseError, BasicFilter, CellRef, CodecError,
    ConditionalFormatEntry, DataSourceFormula, DataValidationEntry, Dimension, Entity, FileTree,
    FilterView, FormatRule, FormulaRangeEntry, NamedRange, NamedRangeEntry, Range, Sheet,
    SheetProperties, Spreadsheet, SpreadsheetProperties, TextFormatRun,
};

pub const MANIFEST_FILE: &str = "spreadsheet.json";
pub const NAMED_RANGES_FILE: &str = "named_ranges.json";
pub const DATA_FILE: &str = "data.tsv";
pub const FORMULA_FILE: &str = "formula.json";
pub const FORMAT_FILE: &str = "format.json";
pub const DIMENSIONS_FILE: &str = "dimensions.json";
pub const DATA_VALIDATION_FILE: &str = "data_validation.json";
pub const CHARTS_FILE: &str = "charts.json";
pub const PIVOT_TABLES_FILE: &str = "pivot_tables.json";
pub const TABLES_FILE: &str = "tables.json";
pub const FILTERS_FILE: &str = "filters.json";
pub const BANDED_RANGES_FILE: &str = "banded_ranges.json";
pub const SLICERS_FILE: &str = "slicers.json";
pub const PROTECTION_FILE: &str = "protection.json";

/// Decode a folder image into the canonical model.
///
/// Formula range entries are expanded per cell, format rules are kept as a
/// list, conditional formats get their surrogate ids and named ranges are
/// resolved to sheet ids. Any malformed address, color or structure fails
/// with an error naming the file and key.
pub fn decode(tree: &FileTree) -> Result<Spreadsheet, CodecError> {
    let mut manifest = JsonObject::read(tree, MANIFEST_FILE)?.ok_or_else(|| {
        CodecError::MissingFile {
            file: MANIFEST_FILE.to_string(),
        }
    })?;
    let spreadsheet_id: String = manifest.take_required("spreadsheetId")?;
    let properties: SpreadsheetProperties = manifest.take_required("properties")?;
    let sheet_props: Vec<SheetProperties> = manifest.take_list("sheets")?;
    manifest.finish()?;

    check_manifest_sheets(&sheet_props)?;

    let mut sheets = Vec::with_capacity(sheet_props.len());
    for props in sheet_props {
        sheets.push(decode_sheet(tree, props)?);
    }

    let named_ranges = match JsonObject::read(tree, NAMED_RANGES_FILE)? {
        Some(mut obj) => {
            let entries: Vec<NamedRangeEntry> = obj.take_list("namedRanges")?;
            obj.finish()?;
            resolve_named_ranges(&sheets, entries)?
        }
        None => Vec::new(),
    };

    log::debug!(
        "decoded spreadsheet {spreadsheet_id} with {} sheet(s)",
        sheets.len()
    );
    Ok(Spreadsheet {
        spreadsheet_id,
        properties,
        sheets,
        named_ranges,
    })
}

/// Encode the model into a folder image.
///
/// Formula ranges are re-derived, `data.tsv` is padded to the data extent and
/// optional files that would be empty are omitted.
pub fn encode(spreadsheet: &Spreadsheet) -> Result<FileTree, CodecError> {
    let sheet_props: Vec<SheetProperties> = spreadsheet
        .sheets
        .iter()
        .map(|s| s.properties.clone())
        .collect();
    check_manifest_sheets(&sheet_props)?;

    let mut tree = FileTree::new();

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Manifest<'a> {
        spreadsheet_id: &'a str,
        properties: &'a SpreadsheetProperties,
        sheets: &'a [SheetProperties],
    }
    tree.insert(
        MANIFEST_FILE,
        to_json(
            MANIFEST_FILE,
            &Manifest {
                spreadsheet_id: &spreadsheet.spreadsheet_id,
                properties: &spreadsheet.properties,
                sheets: &sheet_props,
            },
        )?,
    );

    for sheet in &spreadsheet.sheets {
        encode_sheet(sheet, &mut tree)?;
    }

    if !spreadsheet.named_ranges.is_empty() {
        let mut entries = Vec::with_capacity(spreadsheet.named_ranges.len());
        for (i, named) in spreadsheet.named_ranges.iter().enumerate() {
            let sheet = spreadsheet.sheet_by_id(named.sheet_id).ok_or_else(|| {
                CodecError::invalid(
                    NAMED_RANGES_FILE,
                    format!("namedRanges[{i}]"),
                    format!("sheet id {} does not exist", named.sheet_id),
                )
            })?;
            entries.push(NamedRangeEntry {
                named_range_id: named.named_range_id.clone(),
                name: named.name.clone(),
                sheet: sheet.title().to_string(),
                range: named.range,
            });
        }
        tree.insert(
            NAMED_RANGES_FILE,
            to_json(NAMED_RANGES_FILE, &keyed("namedRanges", &entries))?,
        );
    }

    Ok(tree)
}

fn check_manifest_sheets(sheets: &[SheetProperties]) -> Result<(), CodecError> {
    let mut ids = BTreeSet::new();
    let mut titles = BTreeSet::new();
    let mut folders = BTreeSet::new();
    for (i, props) in sheets.iter().enumerate() {
        let key = format!("sheets[{i}]");
        let fail = |message: String| CodecError::invalid(MANIFEST_FILE, key.clone(), message);
        if let Some(id) = props.sheet_id {
            if !ids.insert(id) {
                return Err(fail(format!("duplicate sheetId {id}")));
            }
        }
        if props.title.is_empty() {
            return Err(fail("title must not be empty".to_string()));
        }
        if !titles.insert(props.title.as_str()) {
            return Err(fail(format!("duplicate title {:?}", props.title)));
        }
        let folder = props.folder.as_str();
        if folder.is_empty() || folder.starts_with('.') || folder.contains(['/', '\\']) {
            return Err(fail(format!("invalid folder name {folder:?}")));
        }
        if !folders.insert(folder) {
            return Err(fail(format!("duplicate folder {folder:?}")));
        }
    }
    Ok(())
}

fn resolve_named_ranges(
    sheets: &[Sheet],
    entries: Vec<NamedRangeEntry>,
) -> Result<Vec<NamedRange>, CodecError> {
    let mut names = BTreeSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let key = format!("namedRanges[{i}]");
        if !names.insert(entry.name.clone()) {
            return Err(CodecError::invalid(
                NAMED_RANGES_FILE,
                key,
                format!("duplicate name {:?}", entry.name),
            ));
        }
        let sheet = sheets
            .iter()
            .find(|s| s.title() == entry.sheet)
            .ok_or_else(|| {
                CodecError::invalid(
                    NAMED_RANGES_FILE,
                    key.clone(),
                    format!("unknown sheet {:?}", entry.sheet),
                )
            })?;
        let sheet_id = sheet.id().ok_or_else(|| {
            CodecError::invalid(
                NAMED_RANGES_FILE,
                key.clone(),
                format!(
                    "sheet {:?} has no sheetId yet; push the sheet before naming ranges in it",
                    entry.sheet
                ),
            )
        })?;
        out.push(NamedRange {
            named_range_id: entry.named_range_id,
            name: entry.name,
            sheet_id,
            range: entry.range,
        });
    }
    unique_ids(NAMED_RANGES_FILE, "namedRanges", &out)?;
    Ok(out)
}

fn decode_sheet(tree: &FileTree, props: SheetProperties) -> Result<Sheet, CodecError> {
    let folder = props.folder.clone();
    let path = |name: &str| join(&folder, name);
    let mut sheet = Sheet::new(props);

    if let Some(text) = read_text(tree, &path(DATA_FILE))? {
        let (values, extent) = tsv::parse(text);
        sheet.values = values;
        sheet.data_extent = extent;
    }

    let file = path(FORMULA_FILE);
    if let Some(mut obj) = JsonObject::read(tree, &file)? {
        for (key, formula) in obj.take_map::<String>("formulas")? {
            let range = parse_range(&file, &key)?;
            check_formula(&file, &key, &formula)?;
            let expanded = FormulaRangeEntry::new(range, formula)
                .expand()
                .map_err(|e| CodecError::invalid(&file, format!("formulas.{key}"), e))?;
            for (cell, formula) in expanded {
                if sheet.formulas.insert(cell, formula).is_some() {
                    return Err(CodecError::invalid(
                        &file,
                        format!("formulas.{key}"),
                        format!("cell {cell} is covered by more than one entry"),
                    ));
                }
            }
        }
        for (key, formula) in obj.take_map::<String>("arrayFormulas")? {
            let range = parse_range(&file, &key)?;
            check_formula(&file, &key, &formula)?;
            if let Some(cell) = range.cells().find(|c| sheet.formulas.contains_key(c)) {
                return Err(CodecError::invalid(
                    &file,
                    format!("arrayFormulas.{key}"),
                    format!("cell {cell} also has a regular formula"),
                ));
            }
            sheet.array_formulas.insert(range, formula);
        }
        for (key, formula) in obj.take_map::<DataSourceFormula>("dataSourceFormulas")? {
            let cell = parse_cell(&file, &key)?;
            sheet.data_source_formulas.insert(cell, formula);
        }
        obj.finish()?;
        check_array_overlaps(&file, &sheet)?;
    }

    let file = path(FORMAT_FILE);
    if let Some(mut obj) = JsonObject::read(tree, &file)? {
        sheet.format_rules = obj.take_list::<FormatRule>("formatRules")?;
        let entries: Vec<ConditionalFormatEntry> = obj.take_list("conditionalFormats")?;
        let mut seen = BTreeSet::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let key = format!("conditionalFormats[{i}]");
            let rule = entry
                .into_rule()
                .map_err(|msg| CodecError::invalid(&file, key.clone(), msg))?;
            if let Some(id) = rule.id {
                if !seen.insert(id) {
                    return Err(CodecError::invalid(
                        &file,
                        key,
                        format!("duplicate ruleIndex {}", id.0),
                    ));
                }
            }
            sheet.conditional_formats.push(rule);
        }
        let merges: Vec<Range> = obj.take_list("merges")?;
        for (i, merge) in merges.into_iter().enumerate() {
            let key = format!("merges[{i}]");
            if merge.is_single_cell() {
                return Err(CodecError::invalid(&file, key, "a merge must span 2+ cells"));
            }
            if let Some(other) = sheet.merges.iter().find(|m| overlaps(m, &merge)) {
                return Err(CodecError::invalid(
                    &file,
                    key,
                    format!("{merge} overlaps merge {other}"),
                ));
            }
            sheet.merges.insert(merge);
        }
        for (key, runs) in obj.take_map::<Vec<TextFormatRun>>("textFormatRuns")? {
            let cell = parse_cell(&file, &key)?;
            sheet.text_runs.insert(cell, runs);
        }
        for (key, note) in obj.take_map::<String>("notes")? {
            let cell = parse_cell(&file, &key)?;
            sheet.notes.insert(cell, note);
        }
        obj.finish()?;
    }

    let file = path(DIMENSIONS_FILE);
    if let Some(mut obj) = JsonObject::read(tree, &file)? {
        let dims = DimensionsFile {
            row_metadata: obj.take_list("rowMetadata")?,
            column_metadata: obj.take_list("columnMetadata")?,
            row_groups: obj.take_list("rowGroups")?,
            column_groups: obj.take_list("columnGroups")?,
        };
        obj.finish()?;
        let at = |key: &'static str| {
            let file = file.clone();
            move |(i, e): (usize, A1ParseError)| {
                CodecError::invalid(&file, format!("{key}[{i}].range"), e)
            }
        };
        sheet.row_metadata =
            expand_metadata(Dimension::Rows, &dims.row_metadata).map_err(at("rowMetadata"))?;
        sheet.column_metadata = expand_metadata(Dimension::Columns, &dims.column_metadata)
            .map_err(at("columnMetadata"))?;
        sheet.row_groups =
            parse_groups(Dimension::Rows, &dims.row_groups).map_err(at("rowGroups"))?;
        sheet.column_groups =
            parse_groups(Dimension::Columns, &dims.column_groups).map_err(at("columnGroups"))?;
    }

    let file = path(DATA_VALIDATION_FILE);
    if let Some(mut obj) = JsonObject::read(tree, &file)? {
        let entries: Vec<DataValidationEntry> = obj.take_list("dataValidation")?;
        obj.finish()?;
        sheet.data_validation = entries.into_iter().map(|e| e.into_group()).collect();
        validation_by_cell(&sheet.data_validation).map_err(|cell| {
            CodecError::invalid(
                &file,
                "dataValidation",
                format!("cell {cell} belongs to more than one validation group"),
            )
        })?;
    }

    sheet.charts = read_entities(tree, &path(CHARTS_FILE), "charts")?;
    sheet.pivot_tables = read_entities(tree, &path(PIVOT_TABLES_FILE), "pivotTables")?;
    sheet.tables = read_entities(tree, &path(TABLES_FILE), "tables")?;
    sheet.banded_ranges = read_entities(tree, &path(BANDED_RANGES_FILE), "bandedRanges")?;
    sheet.slicers = read_entities(tree, &path(SLICERS_FILE), "slicers")?;
    sheet.protected_ranges = read_entities(tree, &path(PROTECTION_FILE), "protectedRanges")?;

    let file = path(FILTERS_FILE);
    if let Some(mut obj) = JsonObject::read(tree, &file)? {
        sheet.basic_filter = obj.take::<BasicFilter>("basicFilter")?;
        sheet.filter_views = obj.take_list("filterViews")?;
        obj.finish()?;
        unique_ids(&file, "filterViews", &sheet.filter_views)?;
    }

    Ok(sheet)
}

fn encode_sheet(sheet: &Sheet, tree: &mut FileTree) -> Result<(), CodecError> {
    let folder = sheet.properties.folder.as_str();
    let path = |name: &str| join(folder, name);

    tree.insert(
        path(DATA_FILE),
        tsv::render(&sheet.values, sheet.occupied_extent()),
    );

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct FormulaOut<'a> {
        #[serde(skip_serializing_if = "A1Map::is_empty")]
        formulas: A1Map<String>,
        #[serde(skip_serializing_if = "A1Map::is_empty")]
        array_formulas: A1Map<&'a String>,
        #[serde(skip_serializing_if = "A1Map::is_empty")]
        data_source_formulas: A1Map<&'a DataSourceFormula>,
    }
    let formulas = FormulaOut {
        formulas: A1Map(
            compress_formulas(&sheet.formulas)
                .into_iter()
                .map(|e| (e.range.to_string(), e.formula))
                .collect(),
        ),
        array_formulas: A1Map(
            sheet
                .array_formulas
                .iter()
                .map(|(r, f)| (r.to_string(), f))
                .collect(),
        ),
        data_source_formulas: A1Map(
            sheet
                .data_source_formulas
                .iter()
                .map(|(c, f)| (c.to_string(), f))
                .collect(),
        ),
    };
    if !(formulas.formulas.is_empty()
        && formulas.array_formulas.is_empty()
        && formulas.data_source_formulas.is_empty())
    {
        let file = path(FORMULA_FILE);
        let bytes = to_json(&file, &formulas)?;
        tree.insert(file, bytes);
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct FormatOut<'a> {
        #[serde(skip_serializing_if = "is_empty_slice")]
        format_rules: &'a [FormatRule],
        #[serde(skip_serializing_if = "Vec::is_empty")]
        conditional_formats: Vec<ConditionalFormatEntry>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        merges: Vec<Range>,
        #[serde(skip_serializing_if = "A1Map::is_empty")]
        text_format_runs: A1Map<&'a Vec<TextFormatRun>>,
        #[serde(skip_serializing_if = "A1Map::is_empty")]
        notes: A1Map<&'a String>,
    }
    let format = FormatOut {
        format_rules: &sheet.format_rules,
        conditional_formats: sheet
            .conditional_formats
            .iter()
            .map(ConditionalFormatEntry::from_rule)
            .collect(),
        merges: sheet.merges.iter().copied().collect(),
        text_format_runs: A1Map(
            sheet
                .text_runs
                .iter()
                .map(|(c, r)| (c.to_string(), r))
                .collect(),
        ),
        notes: A1Map(sheet.notes.iter().map(|(c, n)| (c.to_string(), n)).collect()),
    };
    if !(format.format_rules.is_empty()
        && format.conditional_formats.is_empty()
        && format.merges.is_empty()
        && format.text_format_runs.is_empty()
        && format.notes.is_empty())
    {
        let file = path(FORMAT_FILE);
        let bytes = to_json(&file, &format)?;
        tree.insert(file, bytes);
    }

    let dims = DimensionsFile {
        row_metadata: compress_metadata(Dimension::Rows, &sheet.row_metadata),
        column_metadata: compress_metadata(Dimension::Columns, &sheet.column_metadata),
        row_groups: group_entries(&sheet.row_groups),
        column_groups: group_entries(&sheet.column_groups),
    };
    if !dims.is_empty() {
        let file = path(DIMENSIONS_FILE);
        let bytes = to_json(&file, &dims)?;
        tree.insert(file, bytes);
    }

    if !sheet.data_validation.is_empty() {
        validation_by_cell(&sheet.data_validation).map_err(|cell| {
            CodecError::invalid(
                &path(DATA_VALIDATION_FILE),
                "dataValidation",
                format!("cell {cell} belongs to more than one validation group"),
            )
        })?;
        let entries: Vec<DataValidationEntry> = sheet
            .data_validation
            .iter()
            .map(DataValidationEntry::from_group)
            .collect();
        let file = path(DATA_VALIDATION_FILE);
        let bytes = to_json(&file, &keyed("dataValidation", &entries))?;
        tree.insert(file, bytes);
    }

    write_entities(tree, &path(CHARTS_FILE), "charts", &sheet.charts)?;
    write_entities(tree, &path(PIVOT_TABLES_FILE), "pivotTables", &sheet.pivot_tables)?;
    write_entities(tree, &path(TABLES_FILE), "tables", &sheet.tables)?;
    write_entities(tree, &path(BANDED_RANGES_FILE), "bandedRanges", &sheet.banded_ranges)?;
    write_entities(tree, &path(SLICERS_FILE), "slicers", &sheet.slicers)?;
    write_entities(tree, &path(PROTECTION_FILE), "protectedRanges", &sheet.protected_ranges)?;

    if sheet.basic_filter.is_some() || !sheet.filter_views.is_empty() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct FiltersOut<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            basic_filter: Option<&'a BasicFilter>,
            #[serde(skip_serializing_if = "is_empty_slice")]
            filter_views: &'a [FilterView],
        }
        let file = path(FILTERS_FILE);
        let bytes = to_json(
            &file,
            &FiltersOut {
                basic_filter: sheet.basic_filter.as_ref(),
                filter_views: &sheet.filter_views,
            },
        )?;
        tree.insert(file, bytes);
    }

    Ok(())
}

fn read_entities<E>(tree: &FileTree, file: &str, key: &str) -> Result<Vec<E>, CodecError>
where
    E: Entity + DeserializeOwned,
{
    let Some(mut obj) = JsonObject::read(tree, file)? else {
        return Ok(Vec::new());
    };
    let items: Vec<E> = obj.take_list(key)?;
    obj.finish()?;
    unique_ids(file, key, &items)?;
    Ok(items)
}

fn write_entities<E>(tree: &mut FileTree, file: &str, key: &str, items: &[E]) -> Result<(), CodecError>
where
    E: Serialize,
{
    if items.is_empty() {
        return Ok(());
    }
    let bytes = to_json(file, &keyed(key, items))?;
    tree.insert(file, bytes);
    Ok(())
}

fn unique_ids<E: Entity>(file: &str, key: &str, items: &[E]) -> Result<(), CodecError> {
    let mut seen = BTreeSet::new();
    for (i, item) in items.iter().enumerate() {
        if let Some(id) = item.id() {
            if !seen.insert(id.clone()) {
                return Err(CodecError::invalid(
                    file,
                    format!("{key}[{i}]"),
                    format!("duplicate {} id {id}", E::KIND),
                ));
            }
        }
    }
    Ok(())
}

fn check_formula(file: &str, key: &str, formula: &str) -> Result<(), CodecError> {
    if formula.starts_with('=') {
        Ok(())
    } else {
        Err(CodecError::invalid(file, key, "formula must start with '='"))
    }
}

fn check_array_overlaps(file: &str, sheet: &Sheet) -> Result<(), CodecError> {
    let ranges: Vec<&Range> = sheet.array_formulas.keys().collect();
    for (i, a) in ranges.iter().enumerate() {
        if let Some(b) = ranges[i + 1..].iter().find(|b| overlaps(a, b)) {
            return Err(CodecError::invalid(
                file,
                format!("arrayFormulas.{a}"),
                format!("overlaps array formula {b}"),
            ));
        }
    }
    Ok(())
}

fn overlaps(a: &Range, b: &Range) -> bool {
    a.start.row <= b.end.row
        && b.start.row <= a.end.row
        && a.start.col <= b.end.col
        && b.start.col <= a.end.col
}

fn parse_range(file: &str, key: &str) -> Result<Range, CodecError> {
    Range::from_a1(key).map_err(|e| CodecError::invalid(file, key, e))
}

fn parse_cell(file: &str, key: &str) -> Result<CellRef, CodecError> {
    CellRef::from_a1(key).map_err(|e| CodecError::invalid(file, key, e))
}

fn read_text<'a>(tree: &'a FileTree, file: &str) -> Result<Option<&'a str>, CodecError> {
    match tree.get(file) {
        None => Ok(None),
        Some(bytes) => std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|_| CodecError::NotUtf8 {
                file: file.to_string(),
            }),
    }
}

/// A JSON object being consumed key by key; leftovers are rejected so that
/// misspelled sections are never silently dropped.
struct JsonObject {
    file: String,
    map: JsonMap<String, JsonValue>,
}

impl JsonObject {
    fn read(tree: &FileTree, file: &str) -> Result<Option<Self>, CodecError> {
        let Some(text) = read_text(tree, file)? else {
            return Ok(None);
        };
        let value: JsonValue = serde_json::from_str(text).map_err(|source| CodecError::Json {
            file: file.to_string(),
            source,
        })?;
        match value {
            JsonValue::Object(map) => Ok(Some(Self {
                file: file.to_string(),
                map,
            })),
            _ => Err(CodecError::invalid(file, "$", "expected a JSON object")),
        }
    }

    fn convert<T: DeserializeOwned>(&self, key: &str, value: JsonValue) -> Result<T, CodecError> {
        serde_json::from_value(value).map_err(|e| CodecError::invalid(&self.file, key, e))
    }

    fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, CodecError> {
        match self.map.remove(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => self.convert(key, value).map(Some),
        }
    }

    fn take_required<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, CodecError> {
        self.take(key)?
            .ok_or_else(|| CodecError::invalid(&self.file, key, "required key is missing"))
    }

    /// An array whose items are converted one by one, so errors carry the index.
    fn take_list<T: DeserializeOwned>(&mut self, key: &str) -> Result<Vec<T>, CodecError> {
        match self.map.remove(key) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.convert(&format!("{key}[{i}]"), item))
                .collect(),
            Some(_) => Err(CodecError::invalid(&self.file, key, "expected an array")),
        }
    }

    /// An object keyed by A1 addresses; values are converted one by one.
    fn take_map<T: DeserializeOwned>(&mut self, key: &str) -> Result<Vec<(String, T)>, CodecError> {
        match self.map.remove(key) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Object(entries)) => entries
                .into_iter()
                .map(|(k, v)| {
                    let value = self.convert(&format!("{key}.{k}"), v)?;
                    Ok((k, value))
                })
                .collect(),
            Some(_) => Err(CodecError::invalid(&self.file, key, "expected an object")),
        }
    }

    fn finish(self) -> Result<(), CodecError> {
        match self.map.keys().next() {
            None => Ok(()),
            Some(key) => Err(CodecError::invalid(&self.file, key.clone(), "unknown key")),
        }
    }
}

/// Map serialized in insertion order (row-major for A1 keys).
struct A1Map<T>(Vec<(String, T)>);

impl<T> A1Map<T> {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for A1Map<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

fn keyed<'a, T: Serialize>(key: &'a str, items: &'a [T]) -> BTreeMap<&'a str, &'a [T]> {
    BTreeMap::from([(key, items)])
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

fn to_json(file: &str, value: &impl Serialize) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| CodecError::Json {
        file: file.to_string(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}
