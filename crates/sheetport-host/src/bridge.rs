//! Subprocess management and JSON IPC for the WINE bridge process.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Stdio};

use sheetport::{HostError, SpreadsheetHost};
use sheetport_protocol::{
    Command as BridgeCommand, ExportFormat, Request, Response, ResponseData, ResponseResult,
    SheetRef,
};

/// Errors from the Excel bridge transport.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn WINE bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    HostFault(String),

    #[error("Unexpected response data")]
    UnexpectedResponse,

    #[error("WINE not found. Install WINE and ensure 'wine' is in PATH.")]
    WineNotFound,

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),
}

impl From<BridgeError> for HostError {
    fn from(err: BridgeError) -> Self {
        HostError::new(err.to_string())
    }
}

/// Configuration for starting the Excel host.
pub struct ExcelHostConfig {
    /// Path to the `sheetport-bridge.exe` Windows executable.
    /// If None, searches in common locations relative to the current binary.
    pub bridge_exe_path: Option<PathBuf>,

    /// Path to the WINE executable. Defaults to "wine".
    pub wine_path: PathBuf,

    /// Optional WINEPREFIX to use (for isolating the WINE environment).
    pub wine_prefix: Option<PathBuf>,
}

impl Default for ExcelHostConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            wine_path: PathBuf::from("wine"),
            wine_prefix: None,
        }
    }
}

/// A running Excel instance, driven through the WINE bridge subprocess.
///
/// One host serves exactly one export run; it is never pooled or reused.
/// Every call blocks until Excel returns or errors. The teardown methods of
/// [`SpreadsheetHost`] swallow bridge errors (logging them) so teardown never
/// propagates a failure.
pub struct ExcelHost {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl ExcelHost {
    /// Start the bridge process and initialize an invisible Excel instance
    /// with alerts suppressed.
    pub fn start(config: ExcelHostConfig) -> Result<Self, BridgeError> {
        let exe_path = config.bridge_exe_path.unwrap_or_else(find_bridge_exe);

        if !exe_path.exists() {
            return Err(BridgeError::BridgeExeNotFound(
                exe_path.display().to_string(),
            ));
        }

        let mut cmd = std::process::Command::new(&config.wine_path);

        if let Some(prefix) = &config.wine_prefix {
            cmd.env("WINEPREFIX", prefix);
        }

        cmd.arg(&exe_path);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        tracing::debug!(exe = %exe_path.display(), "spawning WINE bridge");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::WineNotFound
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let mut host = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        };

        // Initialize COM and Excel
        host.send_command(BridgeCommand::Init)?;

        Ok(host)
    }

    /// Send a command to the bridge and wait for the response.
    fn send_command(
        &mut self,
        command: BridgeCommand,
    ) -> Result<Option<ResponseData>, BridgeError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;

        writeln!(self.stdin, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        self.stdin
            .flush()
            .map_err(|e| BridgeError::SendFailed(e.to_string()))?;

        let mut line = String::new();
        self.stdout
            .read_line(&mut line)
            .map_err(|e| BridgeError::ReadFailed(e.to_string()))?;

        if line.is_empty() {
            return Err(BridgeError::NotRunning);
        }

        let response: Response = serde_json::from_str(&line)?;

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(BridgeError::HostFault(message)),
        }
    }

    /// Send a teardown command, logging instead of propagating a failure.
    fn send_teardown(&mut self, command: BridgeCommand, what: &str) {
        if let Err(e) = self.send_command(command) {
            tracing::warn!(step = what, error = %e, "teardown step failed");
        }
    }
}

impl SpreadsheetHost for ExcelHost {
    fn open_workbook(&mut self, path: &Path) -> Result<(), HostError> {
        self.send_command(BridgeCommand::OpenWorkbook {
            path: linux_to_wine_path(path),
        })?;
        Ok(())
    }

    fn refresh_all(&mut self) -> Result<(), HostError> {
        self.send_command(BridgeCommand::RefreshAll)?;
        Ok(())
    }

    fn sheet_names(&mut self) -> Result<Vec<String>, HostError> {
        match self.send_command(BridgeCommand::SheetNames)? {
            Some(ResponseData::SheetNames { names }) => Ok(names),
            _ => Err(BridgeError::UnexpectedResponse.into()),
        }
    }

    fn select_sheet(&mut self, sheet: &SheetRef) -> Result<String, HostError> {
        match self.send_command(BridgeCommand::SelectSheet {
            sheet: sheet.clone(),
        })? {
            Some(ResponseData::SheetName { name }) => Ok(name),
            _ => Err(BridgeError::UnexpectedResponse.into()),
        }
    }

    fn save_sheet(
        &mut self,
        path: &Path,
        format: ExportFormat,
        locale_delimiter: bool,
    ) -> Result<(), HostError> {
        self.send_command(BridgeCommand::SaveSheet {
            path: linux_to_wine_path(path),
            format,
            local: locale_delimiter,
        })?;
        Ok(())
    }

    fn release_sheet(&mut self) {
        self.send_teardown(BridgeCommand::ReleaseSheet, "release sheet");
    }

    fn close_workbook(&mut self) {
        self.send_teardown(BridgeCommand::CloseWorkbook, "close workbook");
    }

    fn quit(&mut self) {
        self.send_teardown(BridgeCommand::Shutdown, "quit application");
    }

    fn reclaim(&mut self) {
        // The Shutdown command makes the bridge exit; reap it here. If it is
        // wedged, kill it rather than leak a WINE process.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(%status, "bridge process exited");
                    return;
                }
                Ok(None) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                _ => {
                    tracing::warn!("bridge process still running after shutdown, killing it");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return;
                }
            }
        }
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/file.xlsx` becomes
/// `Z:\home\user\file.xlsx`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    let abs = if linux_path.is_absolute() {
        linux_path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(linux_path)
    };

    format!("Z:{}", abs.display()).replace('/', "\\")
}

/// Attempt to locate the bridge exe relative to the current executable or in
/// common paths.
fn find_bridge_exe() -> PathBuf {
    // Check next to the current executable
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join("sheetport-bridge.exe");
        if candidate.exists() {
            return candidate;
        }
    }

    // Check in the target directory (for development)
    for profile in ["release", "debug"] {
        let candidate = PathBuf::from(format!(
            "target/x86_64-pc-windows-gnu/{profile}/sheetport-bridge.exe"
        ));
        if candidate.exists() {
            return candidate;
        }
    }

    // Default: assume it's in the current directory
    PathBuf::from("sheetport-bridge.exe")
}
