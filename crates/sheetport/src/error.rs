//! Error types for the export run.

use std::path::PathBuf;

use thiserror::Error;

use sheetport_protocol::SheetRef;

/// An error reported by the automation host for a single operation.
///
/// Host implementations carry whatever diagnostic the external application
/// produced; the core treats it as opaque text.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(msg: impl Into<String>) -> Self {
        HostError(msg.into())
    }
}

/// A terminal failure of an export run.
///
/// Every variant ends the run: nothing is retried and nothing is downgraded
/// to a warning. Files written before the failure stay on disk.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The workbook could not be opened (missing, corrupt, wrong format, or
    /// the application itself was unavailable).
    #[error("could not open workbook '{}'", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    /// The pre-export refresh failed. Not retried — exported values would be
    /// stale otherwise.
    #[error("workbook refresh failed")]
    Refresh(#[source] HostError),

    /// The requested sheet name or index does not exist in the workbook.
    #[error("{0} not found in workbook")]
    SheetNotFound(SheetRef),

    /// The save-as-delimited-text call failed for one target file.
    #[error("could not save '{}'", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    /// Any other collaborator fault, such as a failed sheet enumeration.
    #[error("automation host failure")]
    Host(#[source] HostError),
}
