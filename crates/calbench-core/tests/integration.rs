//! End-to-end tests for calbench-core
//!
//! These tests build a small bench archive in a temporary directory and
//! sync it into a real SQLite store.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use calbench_core::{
    CheckpointStore, DefectReason, FileStatus, MemorySink, Pipeline, ScanOptions, Severity,
    SyncEngine, TimeSource, Watermark,
};
use calbench_store::{ReadingQuery, Store};
use calbench_types::DuplicationOutcome;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Bench {
    archive: TempDir,
    data: TempDir,
}

impl Bench {
    fn new() -> Self {
        Self {
            archive: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.data.path().join("calbench.db")
    }

    /// Write a bench file with an explicit modification time.
    fn write(&self, relative: &str, contents: &str, age: Duration) -> PathBuf {
        let path = self.archive.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
        path
    }

    fn engine(&self, events: Arc<MemorySink>) -> SyncEngine<Store> {
        SyncEngine::builder(
            Store::open(self.db_path()).unwrap(),
            CheckpointStore::beside_database(&self.db_path()),
        )
        .pipeline(Pipeline::new().with_events(events))
        .scan_options(ScanOptions {
            time_source: TimeSource::Modified,
            ..ScanOptions::default()
        })
        .build()
    }
}

const HOUR: Duration = Duration::from_secs(3600);

fn characterisation(serial: &str, hours: std::ops::Range<u32>, resistance: f64) -> String {
    let mut text = format!(
        "Стенд характеризации v2\n\
         Канал: 2; Зав. номер: {serial}; Тип: ЭНИ-100-ДИ; Модель: ДИ\n\
         \n\
         Дата | T | Диапазон | P | U | R | Откл\n"
    );
    let mut last = String::new();
    for h in hours {
        let day = 1 + h / 24;
        last = format!("{day:02}.03.2024 {:02}:00:00", h % 24);
        text.push_str(&format!("{last} | 20,5 | 1 | 0,1 | 12,5 | {resistance} | 0,01\n"));
    }
    text.push_str("Коэффициенты датчика\nКоличество: 3\n0: 1,5\n1: -0,25\n2: 0,003\n");
    assert!(!last.is_empty());
    text
}

fn verification(serial: &str, current: f64) -> String {
    format!(
        "Стенд поверки\n\
         Канал: 1; Зав. номер: {serial}; Тип: ЭнИ-100; Модель: ДИ\n\
         \n\
         \n\
         Дата | T | НПИ | ВПИ | Pз | Pф | Iз | Iф | U | R\n\
         01.04.2024 09:00:00 | 23,0 | 0 | 1,6 | 0,8 | 0,8 | 12,0 | {current} | 24 | 250\n"
    )
}

fn count_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_archive_to_store() {
    let bench = Bench::new();
    bench.write("2024/03/CH_FN_40512.txt", &characterisation("40512", 0..4, 5000.0), HOUR);
    bench.write("2024/04/VR_FN_40512.txt", &verification("40512", 12.0), HOUR);
    bench.write("2024/04/VR_FN_40513.txt", &verification("40513", 25.0), HOUR);
    bench.write("2024/03/CH_FN_spread.txt", &characterisation("40514", 0..(8 * 24 + 1), 5000.0), HOUR);
    bench.write("2024/03/notes.txt", "operator notes", HOUR);

    let events = Arc::new(MemorySink::new());
    let engine = bench.engine(Arc::clone(&events));

    let scan = engine
        .scan(bench.archive.path(), Watermark::LastSync, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(scan.files.len(), 4);

    let result = engine
        .sync(scan.files, CancellationToken::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(result.written, 2);
    assert_eq!(result.defective, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.inserted_rows.characterisation, 4);
    assert_eq!(result.inserted_rows.coefficients, 3);
    assert_eq!(result.inserted_rows.verification, 1);
    assert_eq!(events.count(Severity::Reject), 2);

    let reasons: Vec<_> = result
        .files
        .iter()
        .filter_map(|f| match &f.status {
            FileStatus::Defective { reason, .. } => Some(reason.clone()),
            _ => None,
        })
        .collect();
    assert!(reasons.iter().any(|r| matches!(r, DefectReason::DateSpread { .. })));
    assert!(reasons.iter().any(|r| matches!(r, DefectReason::CurrentOutOfRange { value, .. } if *value == 25.0)));

    assert_eq!(count_in(&bench.archive.path().join("2024/03/defect")), 1);
    assert_eq!(count_in(&bench.archive.path().join("2024/04/defect")), 1);
    assert!(!bench.archive.path().join("2024/04/VR_FN_40513.txt").exists());

    let checkpoint = engine.checkpoints().load().unwrap();
    assert!(checkpoint.last_sync.is_some());

    engine.with_store(|store| {
        let sensors = store.find_sensors_by_serial("40512").unwrap();
        assert_eq!(sensors.len(), 1);
        let sensor = &sensors[0];
        assert_eq!(sensor.sensor_type, "ЭнИ-100");
        assert!(sensor.has_characterisation && sensor.has_coefficients && sensor.has_verification);

        let sets = store.coefficients_by_date(sensor.id).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].entries.len(), 3);

        let rows = store
            .query_verification(&ReadingQuery::new().sensor(sensor.id))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current_real, 12.0);
        assert!(store.find_sensors_by_serial("40513").unwrap().is_empty());
    });
}

#[tokio::test]
async fn test_partial_and_full_duplicates() {
    let bench = Bench::new();
    bench.write("CH_FN_a.txt", &characterisation("777", 0..3, 5000.0), 2 * HOUR);
    let events = Arc::new(MemorySink::new());
    let engine = bench.engine(Arc::clone(&events));

    let files = engine
        .scan(bench.archive.path(), Watermark::All, CancellationToken::new())
        .await
        .unwrap()
        .files;
    engine
        .sync(files, CancellationToken::new(), |_| {})
        .await
        .unwrap();

    // Same sensor, first three hours repeated.
    let longer = bench.write("CH_FN_b.txt", &characterisation("777", 0..6, 5000.0), HOUR);
    let result = engine.process_single_file(&longer).await.unwrap();
    let FileStatus::Written { report } = &result.status else {
        panic!("expected a write, got {:?}", result.status);
    };
    assert_eq!(report.outcome, DuplicationOutcome::PartialDuplicate);
    assert_eq!(report.inserted.characterisation, 3);
    assert_eq!(report.duplicates.characterisation, 3);

    let again = engine.process_single_file(&longer).await.unwrap();
    assert_eq!(again.outcome(), Some(DuplicationOutcome::FullDuplicate));
    engine.with_store(|store| {
        assert_eq!(store.stats().unwrap().characterisation, 6);
    });
}

#[tokio::test]
async fn test_last_sync_watermark_selects_new_files_only() {
    let bench = Bench::new();
    bench.write("CH_FN_old.txt", &characterisation("1", 0..2, 5000.0), 48 * HOUR);
    let engine = bench.engine(Arc::new(MemorySink::new()));

    let first = engine
        .scan(bench.archive.path(), Watermark::LastSync, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.files.len(), 1);
    engine
        .sync(first.files, CancellationToken::new(), |_| {})
        .await
        .unwrap();

    // Written after the sync started.
    let fresh = bench.write("VR_FN_new.txt", &verification("1", 12.0), Duration::ZERO);
    let newer = SystemTime::now() + Duration::from_secs(5);
    File::options()
        .write(true)
        .open(&fresh)
        .unwrap()
        .set_modified(newer)
        .unwrap();

    let second = engine
        .scan(bench.archive.path(), Watermark::LastSync, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.files.len(), 1);
    assert_eq!(second.files[0].path, fresh);

    let all = engine
        .scan(bench.archive.path(), Watermark::All, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(all.files.len(), 2);
}

#[tokio::test]
async fn test_resistance_boundary() {
    let bench = Bench::new();
    let at_bound = bench.write("CH_FN_1.txt", &characterisation("1", 0..2, 7000.0), HOUR);
    let above = bench.write("CH_FN_2.txt", &characterisation("2", 0..2, 7001.0), HOUR);
    let engine = bench.engine(Arc::new(MemorySink::new()));

    let ok = engine.process_single_file(&at_bound).await.unwrap();
    assert_eq!(ok.outcome(), Some(DuplicationOutcome::Clean));

    let rejected = engine.process_single_file(&above).await.unwrap();
    assert!(matches!(
        rejected.status,
        FileStatus::Defective {
            reason: DefectReason::ResistanceOutOfRange { .. },
            ..
        }
    ));
    assert!(bench.archive.path().join("defect/CH_FN_2.txt").exists());
}

#[tokio::test]
async fn test_cancelled_sync_keeps_checkpoint() {
    let bench = Bench::new();
    for i in 0..3 {
        bench.write(
            &format!("CH_FN_{i}.txt"),
            &characterisation(&format!("9{i}"), 0..2, 5000.0),
            HOUR,
        );
    }
    let engine = bench.engine(Arc::new(MemorySink::new()));
    let files = engine
        .scan(bench.archive.path(), Watermark::All, CancellationToken::new())
        .await
        .unwrap()
        .files;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let result = engine
        .sync(files, cancel, move |progress| {
            if progress.processed == 2 {
                trigger.cancel();
            }
        })
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.written, 2);
    assert!(engine.checkpoints().load().unwrap().last_sync.is_none());
    assert!(engine.checkpoints().load().unwrap().last_scan.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_archive_aborts_scan() {
    use std::os::unix::fs::PermissionsExt;

    let bench = Bench::new();
    bench.write("CH_FN_1.txt", &characterisation("1", 0..2, 5000.0), HOUR);
    let root = bench.archive.path();
    fs::set_permissions(root, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(root).is_ok() {
        // Running as root; permission bits are not enforced.
        fs::set_permissions(root, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let engine = bench.engine(Arc::new(MemorySink::new()));
    let result = engine
        .scan(root, Watermark::All, CancellationToken::new())
        .await;
    fs::set_permissions(root, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(
        result,
        Err(calbench_core::SyncError::ArchiveRoot { .. })
    ));
    assert!(engine.checkpoints().load().unwrap().last_scan.is_none());
}
