//! Diff, request generation and push for extrasheet folders.
//!
//! A folder is compared against its pristine snapshot ([`DiffEngine`]), the
//! resulting [`DiffResult`] is lowered to an ordered list of Sheets API
//! requests ([`RequestGenerator`]), and the list is sent as a single atomic
//! `batchUpdate` ([`PushExecutor`]).

pub mod cli;
pub mod diff;
pub mod push;
pub mod requests;
pub mod transport;

pub use diff::{
    DiffEngine, DiffError, DiffOptions, DiffResult, GridDimensionChangedError, GridShape,
    SheetChange, SheetDiff,
};
pub use push::{AssignedId, PushError, PushExecutor, PushOutcome};
pub use requests::{Request, RequestError, RequestGenerator, RequestPlan};
pub use transport::{
    BatchUpdateTransport, HttpTransport, PushConfig, TransportError, DEFAULT_ENDPOINT,
    DEFAULT_TIMEOUT,
};
