//! Input/output path normalization.
//!
//! Paths are resolved once, up front, against the working directory at
//! invocation time. Malformed paths are not rejected here — they surface
//! from the host's open/save calls.

use std::path::{Path, PathBuf};

use sheetport_protocol::ExportFormat;

use crate::request::ExportRequest;

/// Characters stripped from derived filename components. This is the Windows
/// invalid-filename set, since the exported file is written by Excel.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Absolute input/output locations derived from an [`ExportRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    input_dir: PathBuf,
    input_file: String,
    output_dir: PathBuf,
    output_base: String,
}

impl ResolvedPaths {
    /// Resolve against the process working directory.
    pub fn resolve(request: &ExportRequest) -> Self {
        Self::resolve_in(request, &std::env::current_dir().unwrap_or_default())
    }

    /// Resolve against an explicit working directory.
    pub fn resolve_in(request: &ExportRequest, cwd: &Path) -> Self {
        // The input directory and filename are derived directly from the
        // input path, never from intermediate state.
        let input_abs = absolutize(&request.input, cwd);
        let input_dir = input_abs
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        let input_file = file_name_of(&input_abs);

        let (output_dir, output_base) = match &request.output {
            Some(output) => {
                let output_abs = absolutize(output, cwd);
                let dir = output_abs
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.to_path_buf());
                let name = file_name_of(&output_abs);
                // A caller-supplied .txt/.csv suffix would double up with the
                // format extension; strip it. Case-sensitive, like the host.
                let base = name
                    .strip_suffix(".txt")
                    .or_else(|| name.strip_suffix(".csv"))
                    .unwrap_or(&name)
                    .to_string();
                (dir, base)
            }
            None => {
                let base = input_abs
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| input_file.clone());
                (input_dir.clone(), base)
            }
        };

        ResolvedPaths {
            input_dir,
            input_file,
            output_dir,
            output_base,
        }
    }

    /// The absolute path of the workbook to open.
    pub fn input_path(&self) -> PathBuf {
        self.input_dir.join(&self.input_file)
    }

    /// Target file for a single-sheet export: `outdir/base.<ext>`.
    pub fn single_target(&self, format: ExportFormat) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.output_base, format.extension()))
    }

    /// Target file for one sheet of an export-all run:
    /// `outdir/base_<sheetName>.<ext>`.
    pub fn sheet_target(&self, sheet_name: &str, format: ExportFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.output_base,
            sanitize_filename_component(sheet_name),
            format.extension()
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_base(&self) -> &str {
        &self.output_base
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Strip characters that cannot appear in a filename on the host's platform.
/// Sheet names are the one place these can sneak into a derived output name.
pub fn sanitize_filename_component(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect()
}
