//! Excel automation host for sheetport, reached through a WINE bridge process.
//!
//! This crate spawns a Windows `.exe` under WINE that automates Excel through
//! late-bound COM, communicating over JSON-over-stdio, and exposes it as a
//! [`sheetport::SpreadsheetHost`].
//!
//! # Architecture
//!
//! ```text
//! sheetport runner (native Linux)
//!     └── ExcelHost (this crate)
//!           └── spawns: wine sheetport-bridge.exe
//!                 └── COM: Excel.Application (invisible, alerts suppressed)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sheetport::{run_export, ExportRequest};
//! use sheetport_host::{ExcelHost, ExcelHostConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = ExcelHost::start(ExcelHostConfig::default())?;
//!     let outcome = run_export(host, &ExportRequest::new("Foo.xlsx"))?;
//!     for file in outcome.written {
//!         eprintln!("wrote {}", file.display());
//!     }
//!     Ok(())
//! }
//! ```

mod bridge;

pub use bridge::{linux_to_wine_path, BridgeError, ExcelHost, ExcelHostConfig};
