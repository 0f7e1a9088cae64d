//! The seam between the export logic and the external spreadsheet application.

use std::path::Path;

use sheetport_protocol::{ExportFormat, SheetRef};

use crate::error::HostError;

/// Operations the external spreadsheet application must provide.
///
/// An implementation owns the application instance for the duration of one
/// export run: it is created before the run, drives at most one open workbook
/// with at most one selected worksheet, and is torn down once at the end.
/// All calls block until the application returns or errors.
///
/// The teardown methods (`release_sheet`, `close_workbook`, `quit`,
/// `reclaim`) are infallible by contract: implementations log and swallow
/// host-side errors so that teardown never propagates past the run boundary.
pub trait SpreadsheetHost {
    /// Open the workbook at `path`. The application must already be running
    /// invisibly with alert dialogs suppressed.
    fn open_workbook(&mut self, path: &Path) -> Result<(), HostError>;

    /// Trigger a full data/formula refresh of the open workbook and block
    /// until asynchronous queries have completed.
    fn refresh_all(&mut self) -> Result<(), HostError>;

    /// Worksheet names of the open workbook, in native tab order.
    fn sheet_names(&mut self) -> Result<Vec<String>, HostError>;

    /// Select one worksheet by name or 1-based index, replacing any prior
    /// selection. Returns the resolved sheet name. Errors if no such sheet
    /// exists.
    fn select_sheet(&mut self, sheet: &SheetRef) -> Result<String, HostError>;

    /// Save the selected worksheet to `path` as delimited text, silently
    /// overwriting an existing file.
    fn save_sheet(
        &mut self,
        path: &Path,
        format: ExportFormat,
        locale_delimiter: bool,
    ) -> Result<(), HostError>;

    /// Drop the selected worksheet reference, if any.
    fn release_sheet(&mut self);

    /// Close the open workbook without saving changes and release it.
    fn close_workbook(&mut self);

    /// Quit the application instance and release it.
    fn quit(&mut self);

    /// Final reclamation pass after quit (reap the bridge process, free any
    /// remaining automation resources).
    fn reclaim(&mut self);
}
