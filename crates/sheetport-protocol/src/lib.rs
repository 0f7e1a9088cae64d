//! Shared protocol types for communication between the native Linux client
//! and the Windows COM bridge process running under WINE.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! The bridge drives a single Excel.Application instance with at most one open
//! workbook and at most one selected worksheet at a time; there are no handle
//! IDs on the wire.

use serde::{Deserialize, Serialize};

/// A command sent from the Linux client to the WINE bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and create the Excel.Application instance
    /// (invisible, alerts suppressed).
    Init,

    /// Open a workbook from a file path (Windows path). At most one
    /// workbook is open at a time.
    OpenWorkbook { path: String },

    /// Refresh all data connections in the open workbook and block until
    /// asynchronous queries have completed.
    RefreshAll,

    /// List the worksheet names of the open workbook, in native tab order.
    SheetNames,

    /// Select a worksheet of the open workbook by name or 1-based index,
    /// replacing any previously selected one. Returns the resolved name.
    SelectSheet { sheet: SheetRef },

    /// Save the selected worksheet to a delimited text file (Windows path).
    SaveSheet {
        path: String,
        format: ExportFormat,
        /// Use the regional list separator instead of the fixed default.
        local: bool,
    },

    /// Drop the selected worksheet reference, if any.
    ReleaseSheet,

    /// Close the open workbook without saving changes.
    CloseWorkbook,

    /// Shut down the bridge: close any workbook, quit Excel, uninitialize COM.
    Shutdown,
}

/// Reference to a worksheet — by 1-based position (as Excel counts) or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Index(u32),
    Name(String),
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetRef::Index(i) => write!(f, "sheet index {i}"),
            SheetRef::Name(n) => write!(f, "sheet \"{n}\""),
        }
    }
}

/// The delimited-text save format, mapped explicitly to Excel's
/// `XlFileFormat` codes rather than passing raw magic numbers around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Tab-delimited text (`.txt`) — xlTextWindows.
    DelimitedText,
    /// Comma-separated (or semicolon, with the locale switch) values
    /// (`.csv`) — xlCSV.
    CommaOrSemicolonSeparated,
}

impl ExportFormat {
    /// The Excel `XlFileFormat` constant the bridge passes to `SaveAs`.
    pub fn xl_file_format(self) -> i32 {
        match self {
            // xlTextWindows = 20
            ExportFormat::DelimitedText => 20,
            // xlCSV = 6
            ExportFormat::CommaOrSemicolonSeparated => 6,
        }
    }

    /// The file extension for exported files, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::DelimitedText => "txt",
            ExportFormat::CommaOrSemicolonSeparated => "csv",
        }
    }
}

/// A response sent from the WINE bridge back to the Linux client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Worksheet names in native order.
    SheetNames { names: Vec<String> },
    /// The resolved name of a selected worksheet.
    SheetName { name: String },
}
