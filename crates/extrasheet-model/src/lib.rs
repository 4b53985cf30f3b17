//! `extrasheet-model` defines the canonical in-memory model of a spreadsheet
//! folder and the codec between it and the files on disk.
//!
//! The model is what the diff engine compares: formulas are expanded per cell,
//! format rules fold into resolved per-cell formats, and every positional or
//! remotely-assigned entity carries a stable identity.

mod address;
mod codec;
mod color;
pub mod conditional_formatting;
mod data_validation;
pub mod dimensions;
mod error;
pub mod features;
mod file_tree;
pub mod format;
pub mod formula;
mod rectangles;
mod sheet;
pub mod tsv;
mod value;

pub use address::{
    col_to_name, name_to_col, A1ParseError, CellRef, Dimension, DimensionRange, DimensionSpan,
    GridRange, Range, RangeIter, RangeParseError, MAX_COLS, MAX_ROWS,
};
pub use codec::*;
pub use color::{Color, ColorParseError, ThemeColor};
pub use conditional_formatting::*;
pub use data_validation::*;
pub use dimensions::{DimensionGroup, DimensionProps, DEFAULT_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT};
pub use error::CodecError;
pub use features::*;
pub use file_tree::FileTree;
pub use format::*;
pub use formula::{
    compress_formulas, shift_formula, FormulaRangeEntry, FormulaTemplate, ShiftError,
    MIN_RANGE_CELLS,
};
pub use rectangles::cover_rectangles;
pub use sheet::*;
pub use value::{CellValue, ErrorCode};
