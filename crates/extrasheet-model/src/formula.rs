//! Relative formula templates and formula range compression.
//!
//! A formula is split into literal text and cell/range references. Each
//! unanchored row or column component is stored as an offset from the cell
//! that hosts the formula, so the same template rendered at another cell
//! reproduces what auto-fill would write there.

use std::collections::BTreeMap;

use crate::address::{col_to_name, name_to_col};
use crate::rectangles::cover_rectangles;
use crate::{CellRef, Range, MAX_COLS, MAX_ROWS};

/// Minimum number of cells a rectangle must span to be stored as one range entry.
pub const MIN_RANGE_CELLS: u64 = 4;

/// One row or column component of a reference.
///
/// For relative components `value` is the offset from the host cell; for
/// `$`-anchored ones it is the absolute zero-based index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct Axis {
    value: i64,
    absolute: bool,
}

impl Axis {
    fn at(index: u32, host: u32, absolute: bool) -> Self {
        let value = if absolute {
            i64::from(index)
        } else {
            i64::from(index) - i64::from(host)
        };
        Self { value, absolute }
    }

    fn resolve(self, host: u32, limit: u32) -> Option<u32> {
        let v = if self.absolute {
            self.value
        } else {
            i64::from(host) + self.value
        };
        (0..i64::from(limit)).contains(&v).then_some(v as u32)
    }

    fn marker(self) -> &'static str {
        if self.absolute {
            "$"
        } else {
            ""
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Endpoint {
    Cell { col: Axis, row: Axis },
    Column(Axis),
    Row(Axis),
}

impl Endpoint {
    fn render(self, host: CellRef, out: &mut String) -> Option<()> {
        match self {
            Endpoint::Cell { col, row } => {
                let c = col.resolve(host.col, MAX_COLS)?;
                let r = row.resolve(host.row, MAX_ROWS)?;
                out.push_str(col.marker());
                out.push_str(&col_to_name(c));
                out.push_str(row.marker());
                out.push_str(&(r + 1).to_string());
            }
            Endpoint::Column(col) => {
                let c = col.resolve(host.col, MAX_COLS)?;
                out.push_str(col.marker());
                out.push_str(&col_to_name(c));
            }
            Endpoint::Row(row) => {
                let r = row.resolve(host.row, MAX_ROWS)?;
                out.push_str(row.marker());
                out.push_str(&(r + 1).to_string());
            }
        }
        Some(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Reference {
    /// Raw sheet qualifier including the trailing `!`, quotes preserved.
    sheet: Option<String>,
    start: Endpoint,
    end: Option<Endpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Part {
    Text(String),
    Ref(Reference),
}

/// A formula with its references made relative to a host cell.
///
/// Two cells share a template exactly when auto-filling one onto the other
/// would produce the other's formula.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormulaTemplate {
    parts: Vec<Part>,
}

impl FormulaTemplate {
    /// Tokenize `formula` as written in `host`.
    pub fn parse(formula: &str, host: CellRef) -> Self {
        let mut scanner = Scanner {
            src: formula,
            host,
            parts: Vec::new(),
            text: String::new(),
        };
        scanner.run();
        scanner.finish()
    }

    /// Render the template at `host`, or `None` when a reference would leave
    /// the sheet.
    pub fn render(&self, host: CellRef) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Ref(reference) => {
                    if let Some(sheet) = &reference.sheet {
                        out.push_str(sheet);
                    }
                    reference.start.render(host, &mut out)?;
                    if let Some(end) = reference.end {
                        out.push(':');
                        end.render(host, &mut out)?;
                    }
                }
            }
        }
        Some(out)
    }
}

/// Move `formula` written at `from` to `to`, shifting relative references.
pub fn shift_formula(formula: &str, from: CellRef, to: CellRef) -> Option<String> {
    FormulaTemplate::parse(formula, from).render(to)
}

/// The cell's template, when rendering it back reproduces the formula
/// exactly, i.e. expansion from any other cell of a shared rectangle is an
/// exact inverse.
fn compressible_template(formula: &str, host: CellRef) -> Option<FormulaTemplate> {
    let template = FormulaTemplate::parse(formula, host);
    (template.render(host).as_deref() == Some(formula)).then_some(template)
}

/// A formula stored once for a rectangle, written at its top-left cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormulaRangeEntry {
    pub range: Range,
    pub formula: String,
}

impl FormulaRangeEntry {
    pub fn new(range: Range, formula: impl Into<String>) -> Self {
        Self {
            range,
            formula: formula.into(),
        }
    }

    /// Per-cell formulas produced by filling the anchor formula over the range.
    pub fn expand(&self) -> Result<BTreeMap<CellRef, String>, ShiftError> {
        let template = FormulaTemplate::parse(&self.formula, self.range.start);
        let mut out = BTreeMap::new();
        for cell in self.range.cells() {
            let formula = template.render(cell).ok_or(ShiftError {
                anchor: self.range.start,
                cell,
            })?;
            out.insert(cell, formula);
        }
        Ok(out)
    }
}

/// A relative reference that would fall off the sheet when filled to `cell`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("formula at {anchor} references outside the sheet when filled to {cell}")]
pub struct ShiftError {
    pub anchor: CellRef,
    pub cell: CellRef,
}

/// Fold per-cell formulas into range entries.
///
/// Rectangles of at least [`MIN_RANGE_CELLS`] cells sharing one template
/// become a single entry; everything else is stored per cell. Entries come
/// back in row-major order of their anchor.
pub fn compress_formulas(cells: &BTreeMap<CellRef, String>) -> Vec<FormulaRangeEntry> {
    let mut keyed: BTreeMap<CellRef, FormulaTemplate> = BTreeMap::new();
    let mut out = Vec::new();

    for (&cell, formula) in cells {
        match compressible_template(formula, cell) {
            Some(template) => {
                keyed.insert(cell, template);
            }
            None => out.push(FormulaRangeEntry::new(Range::cell(cell), formula.clone())),
        }
    }

    for (range, _) in cover_rectangles(&keyed) {
        if range.area() >= MIN_RANGE_CELLS {
            out.push(FormulaRangeEntry::new(range, cells[&range.start].clone()));
        } else {
            out.extend(
                range
                    .cells()
                    .map(|cell| FormulaRangeEntry::new(Range::cell(cell), cells[&cell].clone())),
            );
        }
    }

    out.sort_by_key(|entry| (entry.range.start, entry.range.end));
    out
}

struct Scanner<'a> {
    src: &'a str,
    host: CellRef,
    parts: Vec<Part>,
    text: String,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$' || b >= 0x80
}

impl Scanner<'_> {
    fn run(&mut self) {
        let bytes = self.src.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'"' => i = self.copy_string_literal(i),
                b'\'' => i = self.quoted_sheet(i),
                b if is_word_byte(b) && b < 0x80 => i = self.word(i),
                _ => {
                    let ch = self.src[i..].chars().next().unwrap_or_default();
                    self.text.push(ch);
                    i += ch.len_utf8().max(1);
                }
            }
        }
    }

    fn finish(mut self) -> FormulaTemplate {
        self.flush_text();
        FormulaTemplate { parts: self.parts }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.parts.push(Part::Text(std::mem::take(&mut self.text)));
        }
    }

    fn push_ref(&mut self, reference: Reference) {
        self.flush_text();
        self.parts.push(Part::Ref(reference));
    }

    /// Copy `"..."` verbatim (with `""` escapes); returns the index after it.
    fn copy_string_literal(&mut self, start: usize) -> usize {
        let end = closing_quote(self.src.as_bytes(), start, b'"');
        self.text.push_str(&self.src[start..end]);
        end
    }

    fn quoted_sheet(&mut self, start: usize) -> usize {
        let bytes = self.src.as_bytes();
        let close = closing_quote(bytes, start, b'\'');
        if bytes.get(close) == Some(&b'!') {
            let sheet = &self.src[start..=close];
            if let Some((reference, next)) = self.reference(close + 1, Some(sheet.to_string())) {
                self.push_ref(reference);
                return next;
            }
        }
        self.text.push_str(&self.src[start..close]);
        close
    }

    fn word(&mut self, start: usize) -> usize {
        let bytes = self.src.as_bytes();

        // Unquoted sheet qualifier: `Sheet1!A1`.
        let mut j = start;
        while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'.') {
            j += 1;
        }
        if j > start && bytes.get(j) == Some(&b'!') {
            let sheet = &self.src[start..=j];
            if let Some((reference, next)) = self.reference(j + 1, Some(sheet.to_string())) {
                self.push_ref(reference);
                return next;
            }
            self.text.push_str(sheet);
            return j + 1;
        }

        if let Some((reference, next)) = self.reference(start, None) {
            self.push_ref(reference);
            return next;
        }

        // Not a reference: copy the whole identifier so no reference is ever
        // found in the middle of a word.
        let mut j = start;
        while j < bytes.len() && is_word_byte(bytes[j]) {
            j += 1;
        }
        self.text.push_str(&self.src[start..j]);
        j
    }

    fn reference(&self, start: usize, sheet: Option<String>) -> Option<(Reference, usize)> {
        let bytes = self.src.as_bytes();
        let (first, mut next) = parse_endpoint(bytes, start, self.host)?;

        let mut end = None;
        if bytes.get(next) == Some(&b':') {
            if let Some((second, after)) = parse_endpoint(bytes, next + 1, self.host) {
                let valid = matches!(
                    (first, second),
                    (Endpoint::Cell { .. }, Endpoint::Cell { .. })
                        | (Endpoint::Cell { .. }, Endpoint::Column(_))
                        | (Endpoint::Cell { .. }, Endpoint::Row(_))
                        | (Endpoint::Column(_), Endpoint::Column(_))
                        | (Endpoint::Row(_), Endpoint::Row(_))
                );
                if valid && !continues_word(bytes, after) {
                    end = Some(second);
                    next = after;
                }
            }
        }

        if end.is_none() && !matches!(first, Endpoint::Cell { .. }) {
            return None;
        }
        if continues_word(bytes, next) {
            return None;
        }
        Some((
            Reference {
                sheet,
                start: first,
                end,
            },
            next,
        ))
    }
}

/// A reference must not run into an identifier, a function call or a sheet
/// qualifier.
fn continues_word(bytes: &[u8], at: usize) -> bool {
    bytes
        .get(at)
        .is_some_and(|&b| is_word_byte(b) || b == b'(' || b == b'!')
}

/// Index just past the quote closing the literal opened at `start`.
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn parse_endpoint(bytes: &[u8], start: usize, host: CellRef) -> Option<(Endpoint, usize)> {
    let mut i = start;
    let lead_abs = bytes.get(i) == Some(&b'$');
    if lead_abs {
        i += 1;
    }

    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &bytes[letters_start..i];

    if letters.is_empty() {
        let (row, next) = parse_row(bytes, i)?;
        return Some((Endpoint::Row(Axis::at(row, host.row, lead_abs)), next));
    }

    let name = std::str::from_utf8(letters).ok()?;
    let col = name_to_col(name).ok()?;
    let col_axis = Axis::at(col, host.col, lead_abs);

    let row_abs = bytes.get(i) == Some(&b'$');
    let digits_at = if row_abs { i + 1 } else { i };
    match parse_row(bytes, digits_at) {
        Some((row, next)) => Some((
            Endpoint::Cell {
                col: col_axis,
                row: Axis::at(row, host.row, row_abs),
            },
            next,
        )),
        None if row_abs => None,
        None => Some((Endpoint::Column(col_axis), i)),
    }
}

/// Parse a 1-based row number at `start`, returning it zero-based.
fn parse_row(bytes: &[u8], start: usize) -> Option<(u32, usize)> {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start {
        return None;
    }
    let digits = std::str::from_utf8(&bytes[start..i]).ok()?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS {
        return None;
    }
    Some((row - 1, i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    fn shift(formula: &str, from: &str, to: &str) -> Option<String> {
        shift_formula(formula, cell(from), cell(to))
    }

    #[test]
    fn relative_components_follow_the_host() {
        assert_eq!(shift("=A2+B2", "C2", "C3").as_deref(), Some("=A3+B3"));
        assert_eq!(shift("=A2+B2", "C2", "D2").as_deref(), Some("=B2+C2"));
        assert_eq!(shift("=SUM(A1:A4)", "B5", "C6").as_deref(), Some("=SUM(B2:B5)"));
    }

    #[test]
    fn anchored_components_are_held() {
        assert_eq!(shift("=$A$1*B2", "C2", "C5").as_deref(), Some("=$A$1*B5"));
        assert_eq!(shift("=A$1+$B2", "C2", "D4").as_deref(), Some("=B$1+$B4"));
    }

    #[test]
    fn whole_rows_columns_and_open_ranges() {
        assert_eq!(shift("=SUM(A:C)", "D1", "E1").as_deref(), Some("=SUM(B:D)"));
        assert_eq!(shift("=SUM(3:5)", "A10", "A11").as_deref(), Some("=SUM(4:6)"));
        assert_eq!(shift("=SUM(A2:A)", "B1", "C1").as_deref(), Some("=SUM(B2:B)"));
    }

    #[test]
    fn sheet_qualified_references_shift() {
        assert_eq!(
            shift("=Sheet1!A1+'My Sheet'!B2", "C1", "C2").as_deref(),
            Some("=Sheet1!A2+'My Sheet'!B3")
        );
    }

    #[test]
    fn string_literals_and_function_names_are_untouched() {
        assert_eq!(
            shift("=IF(A1=\"B2\",LOG10(A1),\"x\"\"C3\")", "B1", "B2").as_deref(),
            Some("=IF(A2=\"B2\",LOG10(A2),\"x\"\"C3\")")
        );
        assert_eq!(shift("=TRUE", "A1", "A2").as_deref(), Some("=TRUE"));
        assert_eq!(shift("=1.5*2", "A1", "A2").as_deref(), Some("=1.5*2"));
    }

    #[test]
    fn shifting_off_the_sheet_fails() {
        assert!(shift("=A1", "B2", "B1").is_none());
        assert!(shift("=A1", "B2", "A2").is_none());
        assert_eq!(shift("=$A$1", "B2", "A1").as_deref(), Some("=$A$1"));
    }

    #[test]
    fn lowercase_references_are_not_compressible() {
        assert!(compressible_template("=A2+B2", cell("C2")).is_some());
        assert!(compressible_template("=a2+b2", cell("C2")).is_none());
    }

    #[test]
    fn column_fill_compresses_to_one_entry() {
        let cells: BTreeMap<CellRef, String> = (2..=10)
            .map(|r| (cell(&format!("C{r}")), format!("=A{r}+B{r}")))
            .collect();
        let entries = compress_formulas(&cells);
        assert_eq!(
            entries,
            vec![FormulaRangeEntry::new(Range::from_a1("C2:C10").unwrap(), "=A2+B2")]
        );
        assert_eq!(entries[0].expand().unwrap(), cells);
    }

    #[test]
    fn small_groups_stay_single_cells() {
        let cells: BTreeMap<CellRef, String> = (1..=3)
            .map(|r| (cell(&format!("B{r}")), format!("=A{r}*2")))
            .collect();
        let entries = compress_formulas(&cells);
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.range.is_single_cell()));
    }

    #[test]
    fn absolute_fill_expands_with_the_anchor_held() {
        let entry = FormulaRangeEntry::new(Range::from_a1("C2:C5").unwrap(), "=$A$1*B2");
        let expanded = entry.expand().unwrap();
        assert_eq!(expanded[&cell("C5")], "=$A$1*B5");
        assert_eq!(compress_formulas(&expanded), vec![entry]);
    }

    #[test]
    fn expansion_off_the_sheet_is_an_error() {
        let entry = FormulaRangeEntry::new(Range::from_a1("ZZY1:ZZZ1").unwrap(), "=ZZZ1");
        let err = entry.expand().unwrap_err();
        assert_eq!(err.anchor, cell("ZZY1"));
        assert_eq!(err.cell, cell("ZZZ1"));
    }
}
