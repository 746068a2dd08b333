//! Per-file ingest pipeline: parse, classify, quarantine or write.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use calbench_types::{DuplicationOutcome, FileKind, ParsedFile, WriteReport};

use crate::error::IngestError;
use crate::events::{EventSink, IngestEvent, Severity, TracingSink};
use crate::parser::{self, ParserOptions};
use crate::quarantine::Quarantine;
use crate::thresholds::{Classification, DefectReason, Thresholds};
use crate::traits::RecordStore;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Parsed and committed; see the report for duplicates.
    Written { report: WriteReport },
    /// Rejected and moved to quarantine.
    Defective {
        reason: DefectReason,
        moved_to: PathBuf,
    },
    /// Could not be ingested; nothing was stored.
    Failed { error: String },
}

/// Per-file result reported by a sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub kind: Option<FileKind>,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Rows skipped by the parser.
    pub skipped_rows: usize,
    /// Parse warnings raised for the file.
    pub warnings: usize,
}

impl FileResult {
    /// Result for a file whose ingest failed.
    pub fn failed(path: &Path, error: &IngestError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: kind_of(path),
            status: FileStatus::Failed {
                error: error.to_string(),
            },
            skipped_rows: 0,
            warnings: 0,
        }
    }

    /// Duplication outcome, if the file was written.
    pub fn outcome(&self) -> Option<DuplicationOutcome> {
        match &self.status {
            FileStatus::Written { report } => Some(report.outcome),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Parser, classifier, quarantine and event sink for one engine.
#[derive(Clone)]
pub struct Pipeline {
    parser: ParserOptions,
    thresholds: Thresholds,
    quarantine: Quarantine,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("parser", &self.parser)
            .field("thresholds", &self.thresholds)
            .field("quarantine", &self.quarantine)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            parser: ParserOptions::default(),
            thresholds: Thresholds::default(),
            quarantine: Quarantine::default(),
            events: Arc::new(TracingSink),
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(mut self, options: ParserOptions) -> Self {
        self.parser = options;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_quarantine(mut self, quarantine: Quarantine) -> Self {
        self.quarantine = quarantine;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn parser_options(&self) -> &ParserOptions {
        &self.parser
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Read and parse a file without classifying or storing it.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile, IngestError> {
        let kind = kind_of(path).ok_or_else(|| IngestError::UnknownKind(path.to_path_buf()))?;
        let bytes = fs::read(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        parser::parse_str(&text, kind, &self.parser).map_err(|source| IngestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Ingest one file into `store`.
    ///
    /// Defective files are moved to quarantine and reported as
    /// [`FileStatus::Defective`]. Every error is also sent to the event sink.
    pub fn ingest<S: RecordStore>(
        &self,
        path: &Path,
        store: &mut S,
    ) -> Result<FileResult, IngestError> {
        let name = display_name(path);
        let result = self.run(path, &name, store);
        if let Err(e) = &result {
            self.emit(&name, Severity::Error, e.to_string());
        }
        result
    }

    fn run<S: RecordStore>(
        &self,
        path: &Path,
        name: &str,
        store: &mut S,
    ) -> Result<FileResult, IngestError> {
        debug!("Ingesting {}", path.display());
        let parsed = self.parse_file(path)?;

        for warning in &parsed.report.warnings {
            self.emit(name, Severity::Warning, warning.to_string());
        }

        let mut result = FileResult {
            path: path.to_path_buf(),
            kind: Some(parsed.kind),
            status: FileStatus::Failed {
                error: String::new(),
            },
            skipped_rows: parsed.report.skipped_rows,
            warnings: parsed.report.warnings.len(),
        };

        if let Classification::Defective(reason) = self.thresholds.classify(&parsed) {
            let moved_to =
                self.quarantine
                    .move_file(path)
                    .map_err(|source| IngestError::Quarantine {
                        path: path.to_path_buf(),
                        target: self.quarantine.target_path(path),
                        source,
                    })?;
            self.emit(
                name,
                Severity::Reject,
                format!("defective: {reason}; moved to {}", moved_to.display()),
            );
            result.status = FileStatus::Defective { reason, moved_to };
            return Ok(result);
        }

        let report = store
            .write_parsed(&parsed)
            .map_err(|e| IngestError::Persistence {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;

        match report.outcome {
            DuplicationOutcome::Clean => self.emit(
                name,
                Severity::Info,
                format!(
                    "stored {} rows for sensor {}",
                    report.inserted.total(),
                    parsed.header.serial_number
                ),
            ),
            DuplicationOutcome::PartialDuplicate => self.emit(
                name,
                Severity::Warning,
                format!(
                    "part of the data is already stored: {} new rows, {} duplicates",
                    report.inserted.total(),
                    report.duplicates.total()
                ),
            ),
            DuplicationOutcome::FullDuplicate => self.emit(
                name,
                Severity::Warning,
                format!(
                    "file already stored: {} duplicate rows",
                    report.duplicates.total()
                ),
            ),
        }

        result.status = FileStatus::Written { report };
        Ok(result)
    }

    fn emit(&self, file: &str, severity: Severity, message: String) {
        self.events.emit(IngestEvent::new(file, severity, message));
    }
}

fn kind_of(path: &Path) -> Option<FileKind> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(FileKind::from_file_name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::mock::MockStore;
    use tempfile::tempdir;

    const VALID_CH: &str = "Стенд характеризации\n\
        Канал: 1; Зав. номер: 500; Тип: ЭнИ-100; Модель: ДИ\n\
        \n\
        Дата | T | Диапазон | P | U | R | Откл\n\
        01.03.2024 08:00:00 | 20 | 1 | 0 | 10 | 5000 | 0\n\
        01.03.2024 09:00:00 | 25 | 1 | 1 | 11 | 5001 | 0\n";

    fn pipeline() -> (Pipeline, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let pipeline = Pipeline::new().with_events(sink.clone());
        (pipeline, sink)
    }

    #[test]
    fn test_ingest_writes_and_reports_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_500.txt");
        fs::write(&path, VALID_CH).unwrap();
        let (pipeline, sink) = pipeline();
        let mut store = MockStore::new();

        let first = pipeline.ingest(&path, &mut store).unwrap();
        assert_eq!(first.outcome(), Some(DuplicationOutcome::Clean));
        assert_eq!(sink.count(Severity::Info), 1);

        let second = pipeline.ingest(&path, &mut store).unwrap();
        assert_eq!(second.outcome(), Some(DuplicationOutcome::FullDuplicate));
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn test_defective_file_is_quarantined() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_501.txt");
        fs::write(&path, VALID_CH.replace("| 5001 |", "| 9000 |")).unwrap();
        let (pipeline, sink) = pipeline();
        let mut store = MockStore::new();

        let result = pipeline.ingest(&path, &mut store).unwrap();
        let FileStatus::Defective { moved_to, .. } = &result.status else {
            panic!("expected defective, got {:?}", result.status);
        };
        assert_eq!(moved_to, &dir.path().join("defect").join("CH_FN_501.txt"));
        assert!(!path.exists());
        assert_eq!(store.write_count(), 0);
        assert_eq!(sink.count(Severity::Reject), 1);
    }

    #[test]
    fn test_rows_without_voltage_and_resistance_are_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_505.txt");
        fs::write(
            &path,
            "Стенд характеризации\n\
             Канал: 1; Зав. номер: 505; Тип: ЭнИ-100; Модель: ДИ\n\
             \n\
             Дата | T | Диапазон | P\n\
             01.03.2024 08:00:00 | 20 | 1 | 0\n\
             01.03.2024 09:00:00 | 25 | 1 | 1\n",
        )
        .unwrap();
        let (pipeline, sink) = pipeline();
        let mut store = MockStore::new();

        let result = pipeline.ingest(&path, &mut store).unwrap();
        assert_eq!(result.outcome(), Some(DuplicationOutcome::Clean));
        assert!(result.warnings > 0);
        assert!(path.exists());
        assert!(!dir.path().join("defect").exists());
        assert_eq!(sink.count(Severity::Reject), 0);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("VR_FN_1.txt");
        fs::write(&path, "banner only\n").unwrap();
        let (pipeline, sink) = pipeline();

        let err = pipeline.ingest(&path, &mut MockStore::new()).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
        assert_eq!(sink.count(Severity::Error), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_store_failure_is_persistence_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_502.txt");
        fs::write(&path, VALID_CH).unwrap();
        let (pipeline, _) = pipeline();
        let mut store = MockStore::new();
        store.set_should_fail(true);

        let err = pipeline.ingest(&path, &mut store).unwrap_err();
        assert!(matches!(err, IngestError::Persistence { .. }));
        let failed = FileResult::failed(&path, &err);
        assert!(failed.is_failed());
        assert_eq!(failed.kind, Some(FileKind::Characterisation));
    }

    #[test]
    fn test_unknown_name_and_missing_file() {
        let dir = tempdir().unwrap();
        let (pipeline, _) = pipeline();
        let mut store = MockStore::new();

        let err = pipeline
            .ingest(&dir.path().join("notes.txt"), &mut store)
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownKind(_)));

        let err = pipeline
            .ingest(&dir.path().join("CH_FN_gone.txt"), &mut store)
            .unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));
    }

    #[test]
    fn test_quarantine_failure_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_503.txt");
        fs::write(&path, VALID_CH.replace("| 5001 |", "| 9000 |")).unwrap();
        // A regular file where the quarantine directory should go.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();
        let (pipeline, _) = pipeline();
        let pipeline = pipeline.with_quarantine(Quarantine::new(Some(blocker)));

        let err = pipeline.ingest(&path, &mut MockStore::new()).unwrap_err();
        assert!(matches!(err, IngestError::Quarantine { .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_warnings_forwarded_to_sink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_504.txt");
        fs::write(&path, VALID_CH.replace("; Модель: ДИ", "")).unwrap();
        let (pipeline, sink) = pipeline();

        let result = pipeline.ingest(&path, &mut MockStore::new()).unwrap();
        assert_eq!(result.warnings, 1);
        assert!(
            sink.events()
                .iter()
                .any(|e| e.severity == Severity::Warning && e.message.contains("model"))
        );
    }

    #[test]
    fn test_file_result_json_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CH_FN_505.txt");
        fs::write(&path, VALID_CH).unwrap();
        let (pipeline, _) = pipeline();

        let result = pipeline.ingest(&path, &mut MockStore::new()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "written");
        assert_eq!(json["kind"], "characterisation");
        assert_eq!(json["report"]["outcome"], "clean");
        assert_eq!(json["report"]["inserted"]["characterisation"], 2);
    }
}
