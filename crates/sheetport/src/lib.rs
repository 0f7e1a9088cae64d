//! Core export orchestration for sheetport.
//!
//! This crate owns everything that does not require a live spreadsheet
//! application: the export request model, path and selector resolution, and
//! the automation-session lifecycle. The application itself sits behind the
//! [`SpreadsheetHost`] trait; `sheetport-host` provides the real
//! implementation (Excel via a WINE COM bridge), and the tests here use a
//! scripted mock.
//!
//! A run is one linear, blocking sequence: open the workbook, optionally
//! refresh it, select the requested sheet(s), save each as delimited text,
//! and tear the session down exactly once — in the order worksheet →
//! workbook → application — on every exit path.

mod error;
mod host;
mod paths;
mod request;
mod runner;
mod session;

pub use error::{ExportError, HostError};
pub use host::SpreadsheetHost;
pub use paths::{sanitize_filename_component, ResolvedPaths};
pub use request::ExportRequest;
pub use runner::{run_export, ExportOutcome};
pub use session::AutomationSession;

pub use sheetport_protocol::{ExportFormat, SheetRef};
