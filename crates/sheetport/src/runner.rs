//! The export run: one linear sequence of host calls per invocation.

use std::path::PathBuf;

use sheetport_protocol::SheetRef;

use crate::error::ExportError;
use crate::host::SpreadsheetHost;
use crate::paths::ResolvedPaths;
use crate::request::ExportRequest;
use crate::session::AutomationSession;

/// What a successful run produced.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    /// Files written, in export order.
    pub written: Vec<PathBuf>,
}

/// Run one export: open, optionally refresh, select, save each target, and
/// tear the session down. Teardown runs exactly once whether the run
/// succeeds or fails at any step; on failure, files already written remain
/// on disk but the run still reports the failure.
pub fn run_export<H: SpreadsheetHost>(
    host: H,
    request: &ExportRequest,
) -> Result<ExportOutcome, ExportError> {
    let paths = ResolvedPaths::resolve(request);
    run_export_resolved(host, request, &paths)
}

/// As [`run_export`], but with pre-resolved paths (used by tests to pin the
/// working directory).
pub(crate) fn run_export_resolved<H: SpreadsheetHost>(
    host: H,
    request: &ExportRequest,
    paths: &ResolvedPaths,
) -> Result<ExportOutcome, ExportError> {
    let mut session = AutomationSession::new(host);
    let result = drive(&mut session, request, paths);
    session.teardown();
    result
}

fn drive<H: SpreadsheetHost>(
    session: &mut AutomationSession<H>,
    request: &ExportRequest,
    paths: &ResolvedPaths,
) -> Result<ExportOutcome, ExportError> {
    let mut outcome = ExportOutcome::default();

    session.open(&paths.input_path())?;

    if request.refresh {
        session.refresh()?;
    }

    match request.selector() {
        Some(selector) => {
            session.select(&selector)?;
            let target = paths.single_target(request.format);
            session.save(&target, request.format, request.locale_delimiter)?;
            tracing::info!(file = %target.display(), "exported sheet");
            outcome.written.push(target);
        }
        None => {
            // Every sheet, in the workbook's native tab order.
            for (pos, name) in session.sheet_names()?.into_iter().enumerate() {
                session.select(&SheetRef::Index(pos as u32 + 1))?;
                let target = paths.sheet_target(&name, request.format);
                session.save(&target, request.format, request.locale_delimiter)?;
                tracing::info!(file = %target.display(), sheet = %name, "exported sheet");
                outcome.written.push(target);
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use sheetport_protocol::{ExportFormat, SheetRef};

    use crate::error::{ExportError, HostError};
    use crate::host::SpreadsheetHost;
    use crate::paths::ResolvedPaths;
    use crate::request::ExportRequest;

    use super::run_export_resolved;

    /// Which step of a run the mock should fail at, if any. `Save(n)` fails
    /// the nth save call (1-based).
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FailAt {
        Nothing,
        Open,
        Refresh,
        Save(usize),
    }

    /// A scripted spreadsheet application that records every call in order
    /// and panics on use-after-release.
    struct MockHost {
        sheets: Vec<&'static str>,
        fail_at: FailAt,
        calls: Rc<RefCell<Vec<String>>>,
        workbook_open: bool,
        quit: bool,
        saves: usize,
        /// When set, successful saves create empty files on disk.
        write_files: bool,
    }

    impl MockHost {
        fn with_sheets(sheets: Vec<&'static str>) -> (Self, Rc<RefCell<Vec<String>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let host = MockHost {
                sheets,
                fail_at: FailAt::Nothing,
                calls: calls.clone(),
                workbook_open: false,
                quit: false,
                saves: 0,
                write_files: false,
            };
            (host, calls)
        }

        fn failing_at(mut self, step: FailAt) -> Self {
            self.fail_at = step;
            self
        }

        fn record(&self, call: impl Into<String>) {
            assert!(!self.quit, "host used after quit");
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl SpreadsheetHost for MockHost {
        fn open_workbook(&mut self, path: &Path) -> Result<(), HostError> {
            self.record(format!("open {}", path.display()));
            if self.fail_at == FailAt::Open {
                return Err(HostError::new("cannot open file"));
            }
            self.workbook_open = true;
            Ok(())
        }

        fn refresh_all(&mut self) -> Result<(), HostError> {
            assert!(self.workbook_open, "refresh without open workbook");
            self.record("refresh");
            if self.fail_at == FailAt::Refresh {
                return Err(HostError::new("query timed out"));
            }
            Ok(())
        }

        fn sheet_names(&mut self) -> Result<Vec<String>, HostError> {
            assert!(self.workbook_open, "sheet_names without open workbook");
            self.record("sheet_names");
            Ok(self.sheets.iter().map(|s| s.to_string()).collect())
        }

        fn select_sheet(&mut self, sheet: &SheetRef) -> Result<String, HostError> {
            assert!(self.workbook_open, "select without open workbook");
            self.record(format!("select {sheet}"));
            let found = match sheet {
                SheetRef::Name(name) => self.sheets.iter().find(|s| *s == name).copied(),
                SheetRef::Index(i) => (*i >= 1)
                    .then(|| self.sheets.get(*i as usize - 1).copied())
                    .flatten(),
            };
            found
                .map(str::to_string)
                .ok_or_else(|| HostError::new(format!("no such sheet: {sheet}")))
        }

        fn save_sheet(
            &mut self,
            path: &Path,
            format: ExportFormat,
            locale_delimiter: bool,
        ) -> Result<(), HostError> {
            self.record(format!(
                "save {} fmt={:?} local={}",
                path.display(),
                format,
                locale_delimiter
            ));
            self.saves += 1;
            if self.fail_at == FailAt::Save(self.saves) {
                return Err(HostError::new("disk full"));
            }
            if self.write_files {
                std::fs::write(path, b"").map_err(|e| HostError::new(e.to_string()))?;
            }
            Ok(())
        }

        fn release_sheet(&mut self) {
            self.record("release_sheet");
        }

        fn close_workbook(&mut self) {
            assert!(self.workbook_open, "close without open workbook");
            self.record("close_workbook");
            self.workbook_open = false;
        }

        fn quit(&mut self) {
            self.record("quit");
            self.quit = true;
        }

        fn reclaim(&mut self) {
            assert!(self.quit, "reclaim before quit");
            self.calls.borrow_mut().push("reclaim".into());
        }
    }

    fn request(input: &str) -> ExportRequest {
        ExportRequest::new(input)
    }

    fn resolve(req: &ExportRequest) -> ResolvedPaths {
        ResolvedPaths::resolve_in(req, Path::new("/work"))
    }

    fn tail(calls: &Rc<RefCell<Vec<String>>>, n: usize) -> Vec<String> {
        let calls = calls.borrow();
        calls[calls.len() - n..].to_vec()
    }

    #[test]
    fn exports_every_sheet_in_native_order() {
        let (host, calls) = MockHost::with_sheets(vec!["Summary", "Data", "Notes"]);
        let req = request("Foo.xlsx");
        let paths = resolve(&req);

        let outcome = run_export_resolved(host, &req, &paths).unwrap();

        assert_eq!(
            outcome.written,
            vec![
                PathBuf::from("/work/Foo_Summary.csv"),
                PathBuf::from("/work/Foo_Data.csv"),
                PathBuf::from("/work/Foo_Notes.csv"),
            ]
        );
        // Sheets are selected by position, each replacing the previous.
        assert_eq!(
            calls.borrow().iter().filter(|c| c.starts_with("select")).count(),
            3
        );
    }

    #[test]
    fn single_sheet_by_name_uses_plain_base_name() {
        let (host, _) = MockHost::with_sheets(vec!["Summary", "Data"]);
        let mut req = request("Foo.xlsx");
        req.output = Some(PathBuf::from("Bar.csv"));
        req.sheet_name = Some("Data".into());
        let paths = resolve(&req);

        let outcome = run_export_resolved(host, &req, &paths).unwrap();
        assert_eq!(outcome.written, vec![PathBuf::from("/work/Bar.csv")]);
    }

    #[test]
    fn text_format_by_index_exports_second_sheet_as_txt() {
        let (host, calls) = MockHost::with_sheets(vec!["First", "Second"]);
        let mut req = request("Foo.xlsx");
        req.sheet_index = Some(2);
        req.format = ExportFormat::DelimitedText;
        let paths = resolve(&req);

        let outcome = run_export_resolved(host, &req, &paths).unwrap();
        assert_eq!(outcome.written, vec![PathBuf::from("/work/Foo.txt")]);
        assert!(calls.borrow().contains(&"select sheet index 2".to_string()));
    }

    #[test]
    fn missing_sheet_is_sheet_not_found_with_no_output() {
        let (host, calls) = MockHost::with_sheets(vec!["Summary"]);
        let mut req = request("Foo.xlsx");
        req.sheet_name = Some("Ghost".into());
        let paths = resolve(&req);

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SheetNotFound(SheetRef::Name(ref n)) if n == "Ghost"
        ));
        assert!(!calls.borrow().iter().any(|c| c.starts_with("save")));
    }

    #[test]
    fn missing_index_is_sheet_not_found() {
        let (host, _) = MockHost::with_sheets(vec!["Only"]);
        let mut req = request("Foo.xlsx");
        req.sheet_index = Some(5);
        let paths = resolve(&req);

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SheetNotFound(SheetRef::Index(5))
        ));
    }

    #[test]
    fn refresh_flag_refreshes_before_selection() {
        let (host, calls) = MockHost::with_sheets(vec!["Data"]);
        let mut req = request("Foo.xlsx");
        req.refresh = true;
        req.sheet_name = Some("Data".into());
        let paths = resolve(&req);

        run_export_resolved(host, &req, &paths).unwrap();

        let calls = calls.borrow();
        let refresh_pos = calls.iter().position(|c| c == "refresh").unwrap();
        let select_pos = calls.iter().position(|c| c.starts_with("select")).unwrap();
        assert!(refresh_pos < select_pos);
    }

    #[test]
    fn teardown_order_after_success() {
        let (host, calls) = MockHost::with_sheets(vec!["Data"]);
        let mut req = request("Foo.xlsx");
        req.sheet_name = Some("Data".into());
        let paths = resolve(&req);

        run_export_resolved(host, &req, &paths).unwrap();

        assert_eq!(
            tail(&calls, 4),
            vec!["release_sheet", "close_workbook", "quit", "reclaim"]
        );
    }

    #[test]
    fn teardown_after_open_failure_skips_workbook_and_sheet() {
        let (host, calls) = MockHost::with_sheets(vec![]);
        let host = host.failing_at(FailAt::Open);
        let req = request("Foo.xlsx");
        let paths = resolve(&req);

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(err, ExportError::Open { .. }));
        // No workbook or worksheet was acquired, so only the application is
        // released.
        assert_eq!(tail(&calls, 2), vec!["quit", "reclaim"]);
        assert!(!calls.borrow().contains(&"close_workbook".to_string()));
    }

    #[test]
    fn teardown_after_refresh_failure_closes_workbook() {
        let (host, calls) = MockHost::with_sheets(vec!["Data"]);
        let host = host.failing_at(FailAt::Refresh);
        let mut req = request("Foo.xlsx");
        req.refresh = true;
        let paths = resolve(&req);

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(err, ExportError::Refresh(_)));
        assert_eq!(tail(&calls, 3), vec!["close_workbook", "quit", "reclaim"]);
    }

    #[test]
    fn save_failure_stops_at_first_faulting_sheet() {
        let (host, calls) = MockHost::with_sheets(vec!["A", "B", "C"]);
        let host = host.failing_at(FailAt::Save(1));
        let req = request("Foo.xlsx");
        let paths = resolve(&req);

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(err, ExportError::Save { .. }));
        // The run fails on the first sheet's save; no further selects follow.
        assert_eq!(
            calls.borrow().iter().filter(|c| c.starts_with("save")).count(),
            1
        );
        assert_eq!(
            tail(&calls, 4),
            vec!["release_sheet", "close_workbook", "quit", "reclaim"]
        );
    }

    #[test]
    fn files_written_before_a_failure_stay_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _) = MockHost::with_sheets(vec!["A", "B", "C"]);
        let mut host = host.failing_at(FailAt::Save(2));
        host.write_files = true;
        let req = request("Foo.xlsx");
        let paths = ResolvedPaths::resolve_in(&req, dir.path());

        let err = run_export_resolved(host, &req, &paths).unwrap_err();
        assert!(matches!(err, ExportError::Save { .. }));
        // No rollback: the first sheet's file survives, the failing one was
        // never written.
        assert!(dir.path().join("Foo_A.csv").exists());
        assert!(!dir.path().join("Foo_B.csv").exists());
        assert!(!dir.path().join("Foo_C.csv").exists());
    }

    #[test]
    fn teardown_runs_exactly_once() {
        let (host, calls) = MockHost::with_sheets(vec!["Data"]);
        let mut req = request("Foo.xlsx");
        req.sheet_name = Some("Data".into());
        let paths = resolve(&req);

        run_export_resolved(host, &req, &paths).unwrap();

        // MockHost::record panics on use-after-quit, so a double teardown
        // would have failed; also check only one quit/reclaim was recorded.
        let calls = calls.borrow();
        assert_eq!(calls.iter().filter(|c| *c == "quit").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "reclaim").count(), 1);
    }

    #[test]
    fn locale_delimiter_reaches_the_save_call() {
        let (host, calls) = MockHost::with_sheets(vec!["Data"]);
        let mut req = request("Foo.xlsx");
        req.sheet_name = Some("Data".into());
        req.locale_delimiter = true;
        let paths = resolve(&req);

        run_export_resolved(host, &req, &paths).unwrap();
        assert!(calls.borrow().iter().any(|c| c.ends_with("local=true")));
    }
}
