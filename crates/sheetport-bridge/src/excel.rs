//! Excel-specific automation for worksheet exports, built on the IDispatch
//! wrapper.

#![cfg(windows)]

use sheetport_protocol::{ExportFormat, SheetRef};

use crate::dispatch::{
    variant_bool, variant_get_i32, variant_get_string, variant_i32, variant_missing, variant_str,
    DispatchObject,
};

/// An Excel.Application instance with at most one open workbook and at most
/// one selected worksheet. Handles are dropped in the reverse order they were
/// acquired: worksheet, then workbook, then the application.
pub struct ExcelApp {
    app: DispatchObject,
    workbook: Option<DispatchObject>,
    worksheet: Option<DispatchObject>,
}

impl ExcelApp {
    /// Create a new Excel.Application instance via COM, invisible and with
    /// alert dialogs suppressed so saves overwrite silently.
    pub fn new() -> Result<Self, String> {
        let app = DispatchObject::create_from_progid("Excel.Application")?;

        app.set_property("Visible", variant_bool(false))?;
        app.set_property("DisplayAlerts", variant_bool(false))?;
        app.set_property("ScreenUpdating", variant_bool(false))?;

        Ok(Self {
            app,
            workbook: None,
            worksheet: None,
        })
    }

    fn workbook(&self) -> Result<&DispatchObject, String> {
        self.workbook.as_ref().ok_or_else(|| "no workbook open".to_string())
    }

    /// Open a workbook from a file path.
    pub fn open_workbook(&mut self, path: &str) -> Result<(), String> {
        if self.workbook.is_some() {
            return Err("a workbook is already open".to_string());
        }
        let workbooks = self.app.get_child("Workbooks")?;
        let wb = workbooks.invoke_child("Open", &[variant_str(path)])?;
        self.workbook = Some(wb);
        Ok(())
    }

    /// Refresh all data connections and block until asynchronous queries
    /// have completed.
    pub fn refresh_all(&self) -> Result<(), String> {
        self.workbook()?.invoke_method("RefreshAll", &[])?;
        self.app
            .invoke_method("CalculateUntilAsyncQueriesDone", &[])?;
        Ok(())
    }

    /// Worksheet names in native tab order.
    pub fn sheet_names(&self) -> Result<Vec<String>, String> {
        let sheets = self.workbook()?.get_child("Worksheets")?;
        let count = variant_get_i32(&sheets.get_property("Count")?)
            .ok_or_else(|| "Worksheets.Count returned a non-integer".to_string())?;

        let mut names = Vec::with_capacity(count.max(0) as usize);
        for i in 1..=count {
            let sheet = sheets.get_indexed("Item", &variant_i32(i))?;
            let name = variant_get_string(&sheet.get_property("Name")?)
                .ok_or_else(|| format!("Worksheets({i}).Name returned a non-string"))?;
            names.push(name);
        }
        Ok(names)
    }

    /// Select one worksheet by name or 1-based index, replacing any prior
    /// selection. Returns the resolved sheet name.
    pub fn select_sheet(&mut self, sheet: &SheetRef) -> Result<String, String> {
        let sheets = self.workbook()?.get_child("Worksheets")?;
        let ws = match sheet {
            SheetRef::Index(i) => sheets.get_indexed("Item", &variant_i32(*i as i32)),
            SheetRef::Name(name) => sheets.get_indexed("Item", &variant_str(name)),
        }?;
        let name = variant_get_string(&ws.get_property("Name")?)
            .ok_or_else(|| "Worksheet.Name returned a non-string".to_string())?;
        self.worksheet = Some(ws);
        Ok(name)
    }

    /// Save the selected worksheet to a delimited text file.
    ///
    /// `Worksheet.SaveAs(Filename, FileFormat, Password, WriteResPassword,
    /// ReadOnlyRecommended, CreateBackup, AddToMru, TextCodepage,
    /// TextVisualLayout, Local)` — only Filename, FileFormat, and Local are
    /// supplied; the rest are skipped.
    pub fn save_sheet(&self, path: &str, format: ExportFormat, local: bool) -> Result<(), String> {
        let ws = self
            .worksheet
            .as_ref()
            .ok_or_else(|| "no worksheet selected".to_string())?;

        let args = [
            variant_str(path),
            variant_i32(format.xl_file_format()),
            variant_missing(),
            variant_missing(),
            variant_missing(),
            variant_missing(),
            variant_missing(),
            variant_missing(),
            variant_missing(),
            variant_bool(local),
        ];
        ws.invoke_method("SaveAs", &args)?;
        Ok(())
    }

    /// Drop the selected worksheet reference.
    pub fn release_sheet(&mut self) {
        self.worksheet = None;
    }

    /// Close the open workbook without saving changes.
    pub fn close_workbook(&mut self) -> Result<(), String> {
        self.worksheet = None;
        match self.workbook.take() {
            Some(wb) => {
                wb.invoke_method("Close", &[variant_bool(false)])?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Shut down: drop any handles and quit Excel.
    pub fn shutdown(mut self) -> Result<(), String> {
        self.worksheet = None;
        let _ = self.close_workbook();
        self.app.invoke_method("Quit", &[])?;
        Ok(())
    }
}
