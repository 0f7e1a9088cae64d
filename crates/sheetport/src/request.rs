//! The immutable input descriptor for one export run.

use std::path::PathBuf;

use sheetport_protocol::{ExportFormat, SheetRef};

/// Everything the caller specifies for a run. Built once (typically from the
/// CLI) and read-only thereafter.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Workbook to open.
    pub input: PathBuf,
    /// Base name/directory for exported files. Defaults to the input's
    /// directory and basename.
    pub output: Option<PathBuf>,
    /// Select a single sheet by name. Mutually exclusive with `sheet_index`.
    pub sheet_name: Option<String>,
    /// Select a single sheet by 1-based position.
    pub sheet_index: Option<u32>,
    /// Recalculate the workbook before export.
    pub refresh: bool,
    /// Delimited-text format to export as.
    pub format: ExportFormat,
    /// Use the regional list separator (commonly `;`) instead of `,`.
    pub locale_delimiter: bool,
}

impl ExportRequest {
    /// A request with all optional behavior off, exporting every sheet to CSV.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        ExportRequest {
            input: input.into(),
            output: None,
            sheet_name: None,
            sheet_index: None,
            refresh: false,
            format: ExportFormat::CommaOrSemicolonSeparated,
            locale_delimiter: false,
        }
    }

    /// The single-sheet selector, if one was given. Name takes precedence if
    /// both selectors are somehow set; `None` means "export all sheets".
    pub fn selector(&self) -> Option<SheetRef> {
        if let Some(name) = &self.sheet_name {
            Some(SheetRef::Name(name.clone()))
        } else {
            self.sheet_index.map(SheetRef::Index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_selector_means_all_sheets() {
        assert_eq!(ExportRequest::new("Foo.xlsx").selector(), None);
    }

    #[test]
    fn name_takes_precedence_over_index() {
        let mut req = ExportRequest::new("Foo.xlsx");
        req.sheet_name = Some("Data".into());
        req.sheet_index = Some(3);
        assert_eq!(req.selector(), Some(SheetRef::Name("Data".into())));
    }

    #[test]
    fn index_selector_is_one_based_passthrough() {
        let mut req = ExportRequest::new("Foo.xlsx");
        req.sheet_index = Some(2);
        assert_eq!(req.selector(), Some(SheetRef::Index(2)));
    }
}
