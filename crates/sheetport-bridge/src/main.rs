//! sheetport bridge — a Windows process that drives Excel worksheet exports
//! via COM, controlled by JSON commands over stdin/stdout.
//!
//! Designed to be cross-compiled from Linux and run under WINE.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic/log messages go to stderr (never stdout)

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod excel;

#[cfg(not(windows))]
fn main() {
    eprintln!("sheetport-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run under WINE on Linux.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead, Write};

    use sheetport_protocol::*;

    // Use stderr for all diagnostic output so stdout stays clean for protocol
    eprintln!("[sheetport-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut excel: Option<excel::ExcelApp> = None;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[sheetport-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[sheetport-bridge] JSON parse error: {e}");
                // Send an error response with id=0 since we couldn't parse
                // the request
                let resp = Response {
                    id: 0,
                    result: ResponseResult::Error {
                        message: format!("JSON parse error: {e}"),
                    },
                };
                let _ = writeln!(out, "{}", serde_json::to_string(&resp).unwrap());
                let _ = out.flush();
                continue;
            }
        };

        let response = handle_command(&mut excel, &request);
        let json = serde_json::to_string(&response).unwrap();
        let _ = writeln!(out, "{json}");
        let _ = out.flush();

        // Exit once a shutdown has been acknowledged
        if matches!(request.command, Command::Shutdown)
            && matches!(response.result, ResponseResult::Ok { .. })
        {
            eprintln!("[sheetport-bridge] Shutdown complete, exiting.");
            break;
        }
    }

    // If Excel is still running when stdin closes, try to clean up
    if let Some(app) = excel {
        eprintln!("[sheetport-bridge] stdin closed, shutting down Excel...");
        let _ = app.shutdown();
    }

    eprintln!("[sheetport-bridge] Process exiting.");
}

#[cfg(windows)]
fn handle_command(
    excel: &mut Option<excel::ExcelApp>,
    request: &sheetport_protocol::Request,
) -> sheetport_protocol::Response {
    use sheetport_protocol::*;

    let id = request.id;

    let result = match &request.command {
        Command::Init => init_com_and_excel(excel),
        Command::OpenWorkbook { path } => with_excel(excel, |app| {
            app.open_workbook(path)?;
            Ok(ResponseResult::Ok { data: None })
        }),
        Command::RefreshAll => with_excel(excel, |app| {
            app.refresh_all()?;
            Ok(ResponseResult::Ok { data: None })
        }),
        Command::SheetNames => with_excel(excel, |app| {
            let names = app.sheet_names()?;
            Ok(ResponseResult::Ok {
                data: Some(ResponseData::SheetNames { names }),
            })
        }),
        Command::SelectSheet { sheet } => with_excel(excel, |app| {
            let name = app.select_sheet(sheet)?;
            Ok(ResponseResult::Ok {
                data: Some(ResponseData::SheetName { name }),
            })
        }),
        Command::SaveSheet {
            path,
            format,
            local,
        } => with_excel(excel, |app| {
            app.save_sheet(path, *format, *local)?;
            Ok(ResponseResult::Ok { data: None })
        }),
        Command::ReleaseSheet => with_excel(excel, |app| {
            app.release_sheet();
            Ok(ResponseResult::Ok { data: None })
        }),
        Command::CloseWorkbook => with_excel(excel, |app| {
            app.close_workbook()?;
            Ok(ResponseResult::Ok { data: None })
        }),
        Command::Shutdown => match excel.take() {
            Some(app) => match app.shutdown() {
                Ok(()) => {
                    uninit_com();
                    ResponseResult::Ok { data: None }
                }
                Err(e) => ResponseResult::Error {
                    message: format!("Shutdown failed: {e}"),
                },
            },
            None => ResponseResult::Ok { data: None },
        },
    };

    Response { id, result }
}

#[cfg(windows)]
fn init_com_and_excel(excel: &mut Option<excel::ExcelApp>) -> sheetport_protocol::ResponseResult {
    use sheetport_protocol::ResponseResult;
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

    if excel.is_some() {
        return ResponseResult::Ok { data: None }; // Already initialized
    }

    // Initialize COM in Single-Threaded Apartment mode (required by Excel)
    unsafe {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        if let Err(e) = hr.ok() {
            return ResponseResult::Error {
                message: format!("CoInitializeEx failed: {e}"),
            };
        }
    }

    eprintln!("[sheetport-bridge] COM initialized (STA)");

    match excel::ExcelApp::new() {
        Ok(app) => {
            eprintln!("[sheetport-bridge] Excel.Application created successfully");
            *excel = Some(app);
            ResponseResult::Ok { data: None }
        }
        Err(e) => ResponseResult::Error {
            message: format!("Failed to create Excel.Application: {e}"),
        },
    }
}

#[cfg(windows)]
fn uninit_com() {
    unsafe {
        windows::Win32::System::Com::CoUninitialize();
    }
    eprintln!("[sheetport-bridge] COM uninitialized");
}

#[cfg(windows)]
fn with_excel(
    excel: &mut Option<excel::ExcelApp>,
    f: impl FnOnce(&mut excel::ExcelApp) -> Result<sheetport_protocol::ResponseResult, String>,
) -> sheetport_protocol::ResponseResult {
    match excel.as_mut() {
        Some(app) => match f(app) {
            Ok(r) => r,
            Err(e) => sheetport_protocol::ResponseResult::Error { message: e },
        },
        None => sheetport_protocol::ResponseResult::Error {
            message: "Excel not initialized. Send 'Init' command first.".to_string(),
        },
    }
}
