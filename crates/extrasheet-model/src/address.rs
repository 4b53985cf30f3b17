use core::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest column supported by A1 notation in this crate (`ZZZ`, 18,278 columns).
pub const MAX_COLS: u32 = 18_278;

/// Largest row count supported (the remote enforces a 10M cell limit).
pub const MAX_ROWS: u32 = 10_000_000;

/// A reference to a single cell within a sheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is A1 row `1`
/// - `col = 0` is A1 column `A`
///
/// Ordering is row-major, which is the order cells are emitted in every
/// on-disk file and in every generated request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    /// Construct a new [`CellRef`].
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        // Accept optional `$` markers.
        let mut idx = 0usize;
        let bytes = s.as_bytes();
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }

        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }

        let col_str = &s[col_start..idx];
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }

        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        let row = parse_row_number(&s[row_start..idx])?;
        Ok(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CellRef::from_a1(&s).map_err(|e| D::Error::custom(format!("{e}: {s:?}")))
    }
}

/// A rectangular region within a sheet.
///
/// The range is inclusive and always normalized such that:
/// - `start.row <= end.row`
/// - `start.col <= end.col`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// Construct a new range, normalizing coordinates if needed.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let start_row = if a.row <= b.row { a.row } else { b.row };
        let end_row = if a.row <= b.row { b.row } else { a.row };
        let start_col = if a.col <= b.col { a.col } else { b.col };
        let end_col = if a.col <= b.col { b.col } else { a.col };
        Self {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        }
    }

    /// A one-cell range.
    pub const fn cell(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }

    /// Returns true if `cell` lies within this range.
    #[inline]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    /// Number of columns in the range.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Number of rows in the range.
    #[inline]
    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of cells in the range.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Returns true if the range is exactly one cell.
    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> RangeIter {
        RangeIter {
            range: *self,
            next: Some(self.start),
        }
    }

    /// Convert into the zero-based, half-open wire form.
    pub fn to_grid_range(&self, sheet_id: u32) -> GridRange {
        GridRange {
            sheet_id,
            start_row_index: Some(self.start.row),
            end_row_index: Some(self.end.row + 1),
            start_column_index: Some(self.start.col),
            end_column_index: Some(self.end.col + 1),
        }
    }

    /// Parse an A1-style range like `A1:B2` or a single-cell reference like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }

        match s.split_once(':') {
            None => {
                let cell = CellRef::from_a1(s).map_err(RangeParseError::Cell)?;
                Ok(Range::new(cell, cell))
            }
            Some((a, b)) => {
                let start = CellRef::from_a1(a).map_err(RangeParseError::Cell)?;
                let end = CellRef::from_a1(b).map_err(RangeParseError::Cell)?;
                Ok(Range::new(start, end))
            }
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl Serialize for Range {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Range {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Range::from_a1(&s).map_err(|e| D::Error::custom(format!("{e}: {s:?}")))
    }
}

/// Row-major iterator over the cells of a [`Range`].
#[derive(Clone, Debug)]
pub struct RangeIter {
    range: Range,
    next: Option<CellRef>,
}

impl Iterator for RangeIter {
    type Item = CellRef;

    fn next(&mut self) -> Option<CellRef> {
        let current = self.next?;
        self.next = if current.col < self.range.end.col {
            Some(CellRef::new(current.row, current.col + 1))
        } else if current.row < self.range.end.row {
            Some(CellRef::new(current.row + 1, self.range.start.col))
        } else {
            None
        };
        Some(current)
    }
}

/// Zero-based, half-open range in the remote wire format.
///
/// Missing bounds are unbounded; a `GridRange` with only `sheet_id` covers the
/// whole sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

impl GridRange {
    /// A range covering an entire sheet.
    pub const fn whole_sheet(sheet_id: u32) -> Self {
        Self {
            sheet_id,
            start_row_index: None,
            end_row_index: None,
            start_column_index: None,
            end_column_index: None,
        }
    }

    /// Convert a fully bounded, non-empty grid range back into an inclusive [`Range`].
    #[cfg(test)]
    fn to_range(&self) -> Option<Range> {
        let (r0, r1) = (self.start_row_index?, self.end_row_index?);
        let (c0, c1) = (self.start_column_index?, self.end_column_index?);
        if r1 <= r0 || c1 <= c0 {
            return None;
        }
        Some(Range::new(CellRef::new(r0, c0), CellRef::new(r1 - 1, c1 - 1)))
    }
}

/// Axis of a sheet dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Rows,
    Columns,
}

/// A contiguous run of rows or columns, zero-based and half-open.
///
/// In files a row span is written `5` or `7:9` (1-based, inclusive) and a
/// column span `B` or `A:C`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionSpan {
    pub dimension: Dimension,
    pub start: u32,
    pub end: u32,
}

impl DimensionSpan {
    pub const fn new(dimension: Dimension, start: u32, end: u32) -> Self {
        Self {
            dimension,
            start,
            end,
        }
    }

    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.start && index < self.end
    }

    pub fn indices(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }

    /// Parse a span written in A1 style for the given axis.
    pub fn parse(dimension: Dimension, s: &str) -> Result<Self, A1ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let parse_one = |part: &str| -> Result<u32, A1ParseError> {
            let part = part.trim().trim_start_matches('$');
            match dimension {
                Dimension::Rows => parse_row_number(part),
                Dimension::Columns => name_to_col(part),
            }
        };
        let (start, last) = match s.split_once(':') {
            None => {
                let v = parse_one(s)?;
                (v, v)
            }
            Some((a, b)) => {
                let (a, b) = (parse_one(a)?, parse_one(b)?);
                (a.min(b), a.max(b))
            }
        };
        Ok(Self::new(dimension, start, last + 1))
    }

    /// Wire form (`DimensionRange`).
    pub fn to_dimension_range(&self, sheet_id: u32) -> DimensionRange {
        DimensionRange {
            sheet_id,
            dimension: self.dimension,
            start_index: self.start,
            end_index: self.end,
        }
    }
}

impl fmt::Display for DimensionSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |i: u32| match self.dimension {
            Dimension::Rows => (i + 1).to_string(),
            Dimension::Columns => col_to_name(i),
        };
        let last = self.end.saturating_sub(1).max(self.start);
        if last == self.start {
            f.write_str(&render(self.start))
        } else {
            write!(f, "{}:{}", render(self.start), render(last))
        }
    }
}

/// Zero-based, half-open run of rows or columns in the wire format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: u32,
    pub dimension: Dimension,
    pub start_index: u32,
    pub end_index: u32,
}

/// Errors that can occur when parsing an A1 cell reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum A1ParseError {
    Empty,
    MissingColumn,
    MissingRow,
    InvalidColumn,
    InvalidRow,
    TrailingCharacters,
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            A1ParseError::Empty => "empty A1 reference",
            A1ParseError::MissingColumn => "missing column in A1 reference",
            A1ParseError::MissingRow => "missing row in A1 reference",
            A1ParseError::InvalidColumn => "invalid column in A1 reference",
            A1ParseError::InvalidRow => "invalid row in A1 reference",
            A1ParseError::TrailingCharacters => "trailing characters in A1 reference",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for A1ParseError {}

/// Errors that can occur when parsing an A1 range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    Empty,
    Cell(A1ParseError),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::Empty => f.write_str("empty A1 range"),
            RangeParseError::Cell(e) => write!(f, "invalid cell reference in range: {e}"),
        }
    }
}

impl std::error::Error for RangeParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RangeParseError::Empty => None,
            RangeParseError::Cell(e) => Some(e),
        }
    }
}

/// Column index (0-based) to letters.
pub fn col_to_name(col: u32) -> String {
    // A1 columns are 1-based. We store 0-based internally.
    let mut n = col + 1;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Column letters (case-insensitive) to a 0-based index.
pub fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    if s.is_empty() || s.len() > 3 {
        return Err(A1ParseError::InvalidColumn);
    }
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col * 26 + v;
    }
    Ok(col - 1)
}

fn parse_row_number(s: &str) -> Result<u32, A1ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(A1ParseError::InvalidRow);
    }
    let row_1_based: u32 = s.parse().map_err(|_| A1ParseError::InvalidRow)?;
    if row_1_based == 0 || row_1_based > MAX_ROWS {
        return Err(A1ParseError::InvalidRow);
    }
    Ok(row_1_based - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn a1_roundtrip() {
        let c = CellRef::new(0, 0);
        assert_eq!(c.to_a1(), "A1");
        assert_eq!(CellRef::from_a1("A1").unwrap(), c);
        assert_eq!(CellRef::from_a1("$A$1").unwrap(), c);

        let c2 = CellRef::new(31, 54); // BC32
        assert_eq!(c2.to_a1(), "BC32");
        assert_eq!(CellRef::from_a1("bc32").unwrap(), c2);
    }

    #[test]
    fn column_letters_at_every_carry_boundary() {
        let cases = [
            (0, "A"),
            (25, "Z"),
            (26, "AA"),
            (51, "AZ"),
            (52, "BA"),
            (701, "ZZ"),
            (702, "AAA"),
            (MAX_COLS - 1, "ZZZ"),
        ];
        for (col, name) in cases {
            assert_eq!(col_to_name(col), name, "col {col}");
            assert_eq!(name_to_col(name).unwrap(), col, "name {name}");
        }
        assert_eq!(name_to_col("AAAA"), Err(A1ParseError::InvalidColumn));
    }

    #[test]
    fn one_based_display_maps_to_zero_based_indices() {
        let b2 = CellRef::from_a1("B2").unwrap();
        assert_eq!((b2.row, b2.col), (1, 1));
        let g = Range::cell(b2).to_grid_range(7);
        assert_eq!(g.sheet_id, 7);
        assert_eq!((g.start_row_index, g.end_row_index), (Some(1), Some(2)));
        assert_eq!((g.start_column_index, g.end_column_index), (Some(1), Some(2)));

        let r = Range::from_a1("C2:C100").unwrap();
        let g = r.to_grid_range(0);
        assert_eq!((g.start_row_index, g.end_row_index), (Some(1), Some(100)));
        assert_eq!((g.start_column_index, g.end_column_index), (Some(2), Some(3)));
        assert_eq!(g.to_range(), Some(r));
    }

    #[test]
    fn a1_range_parsing() {
        let r = Range::from_a1("A1:B2").unwrap();
        assert_eq!(r.start, CellRef::new(0, 0));
        assert_eq!(r.end, CellRef::new(1, 1));
        assert_eq!(r.area(), 4);

        let reversed = Range::from_a1("B2:A1").unwrap();
        assert_eq!(reversed, r);

        let single = Range::from_a1("C3").unwrap();
        assert!(single.is_single_cell());
        assert_eq!(single.start, CellRef::new(2, 2));
        assert_eq!(single.to_string(), "C3");
    }

    #[test]
    fn a1_rejects_malformed_references() {
        assert_eq!(CellRef::from_a1(""), Err(A1ParseError::Empty));
        assert_eq!(CellRef::from_a1("12"), Err(A1ParseError::MissingColumn));
        assert_eq!(CellRef::from_a1("AB"), Err(A1ParseError::MissingRow));
        assert_eq!(CellRef::from_a1("A0"), Err(A1ParseError::InvalidRow));
        assert_eq!(CellRef::from_a1("A1x"), Err(A1ParseError::TrailingCharacters));
        assert!(CellRef::from_a1("A10000001").is_err());
    }

    #[test]
    fn range_iter_is_row_major() {
        let r = Range::from_a1("B2:C3").unwrap();
        let cells: Vec<String> = r.cells().map(|c| c.to_a1()).collect();
        assert_eq!(cells, vec!["B2", "C2", "B3", "C3"]);
    }

    #[test]
    fn dimension_spans_parse_and_render() {
        let rows = DimensionSpan::parse(Dimension::Rows, "7:9").unwrap();
        assert_eq!((rows.start, rows.end), (6, 9));
        assert_eq!(rows.to_string(), "7:9");

        let row = DimensionSpan::parse(Dimension::Rows, "5").unwrap();
        assert_eq!((row.start, row.end), (4, 5));
        assert_eq!(row.to_string(), "5");

        let cols = DimensionSpan::parse(Dimension::Columns, "A:C").unwrap();
        assert_eq!((cols.start, cols.end), (0, 3));
        assert_eq!(cols.to_string(), "A:C");

        assert!(DimensionSpan::parse(Dimension::Rows, "B").is_err());
        assert!(DimensionSpan::parse(Dimension::Columns, "3").is_err());
    }

    #[test]
    fn serde_uses_a1_strings() {
        let r = Range::from_a1("A1:B2").unwrap();
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"A1:B2\"");
        let back: Range = serde_json::from_str("\"a1:b2\"").unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<CellRef>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn cell_a1_roundtrips(row in 0u32..MAX_ROWS, col in 0u32..MAX_COLS) {
            let cell = CellRef::new(row, col);
            prop_assert_eq!(CellRef::from_a1(&cell.to_a1()).unwrap(), cell);
        }

        #[test]
        fn grid_range_roundtrips(
            r0 in 0u32..5000, h in 1u32..500,
            c0 in 0u32..700, w in 1u32..50,
        ) {
            let range = Range::new(CellRef::new(r0, c0), CellRef::new(r0 + h - 1, c0 + w - 1));
            let grid = range.to_grid_range(3);
            prop_assert_eq!(grid.end_row_index.unwrap() - grid.start_row_index.unwrap(), h);
            prop_assert_eq!(grid.end_column_index.unwrap() - grid.start_column_index.unwrap(), w);
            prop_assert_eq!(grid.to_range(), Some(range));
            prop_assert_eq!(Range::from_a1(&range.to_string()).unwrap(), range);
        }
    }
}
