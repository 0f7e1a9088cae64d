//! The automation session: scoped ownership of the host's handles.
//!
//! The session tracks which handles have been acquired (workbook, worksheet)
//! and guarantees the teardown sequence runs exactly once per run — on the
//! success path, on the first failure, and on unwind — in the order
//! worksheet → workbook → application, followed by a reclamation pass.

use std::path::Path;

use sheetport_protocol::{ExportFormat, SheetRef};

use crate::error::ExportError;
use crate::host::SpreadsheetHost;

pub struct AutomationSession<H: SpreadsheetHost> {
    host: H,
    workbook_open: bool,
    sheet_selected: bool,
    torn_down: bool,
}

impl<H: SpreadsheetHost> AutomationSession<H> {
    /// Take ownership of a running host. The application handle is considered
    /// acquired from this point; teardown will quit it.
    pub fn new(host: H) -> Self {
        AutomationSession {
            host,
            workbook_open: false,
            sheet_selected: false,
            torn_down: false,
        }
    }

    /// Open the workbook at `path`.
    pub fn open(&mut self, path: &Path) -> Result<(), ExportError> {
        match self.host.open_workbook(path) {
            Ok(()) => {
                self.workbook_open = true;
                Ok(())
            }
            Err(source) => Err(ExportError::Open {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Full refresh of the open workbook, blocking until complete.
    pub fn refresh(&mut self) -> Result<(), ExportError> {
        self.host.refresh_all().map_err(ExportError::Refresh)
    }

    /// Worksheet names in native order.
    pub fn sheet_names(&mut self) -> Result<Vec<String>, ExportError> {
        self.host.sheet_names().map_err(ExportError::Host)
    }

    /// Select one worksheet, releasing any previously selected one first.
    /// A selector that matches nothing is a [`ExportError::SheetNotFound`].
    pub fn select(&mut self, sheet: &SheetRef) -> Result<String, ExportError> {
        if self.sheet_selected {
            self.host.release_sheet();
            self.sheet_selected = false;
        }
        match self.host.select_sheet(sheet) {
            Ok(name) => {
                self.sheet_selected = true;
                Ok(name)
            }
            Err(source) => {
                tracing::debug!(selector = %sheet, error = %source, "sheet selection failed");
                Err(ExportError::SheetNotFound(sheet.clone()))
            }
        }
    }

    /// Save the selected worksheet as delimited text.
    pub fn save(
        &mut self,
        path: &Path,
        format: ExportFormat,
        locale_delimiter: bool,
    ) -> Result<(), ExportError> {
        self.host
            .save_sheet(path, format, locale_delimiter)
            .map_err(|source| ExportError::Save {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Release every acquired handle, most recently acquired first, then run
    /// the reclamation pass. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if self.sheet_selected {
            self.host.release_sheet();
            self.sheet_selected = false;
        }
        if self.workbook_open {
            self.host.close_workbook();
            self.workbook_open = false;
        }
        self.host.quit();
        self.host.reclaim();
    }
}

impl<H: SpreadsheetHost> Drop for AutomationSession<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
