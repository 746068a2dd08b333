//! Trait abstraction over the record store.
//!
//! The pipeline only needs one operation from its store: commit a parsed
//! file with duplicate detection. [`RecordStore`] is implemented for the
//! SQLite [`Store`] and for [`MockStore`](crate::MockStore).

use calbench_store::Store;
use calbench_types::{ParsedFile, WriteReport};

/// Transactional sink for parsed files.
///
/// # Example
///
/// ```
/// use calbench_core::RecordStore;
/// use calbench_types::ParsedFile;
///
/// fn commit<S: RecordStore>(store: &mut S, file: &ParsedFile) -> bool {
///     store.write_parsed(file).is_ok()
/// }
/// ```
pub trait RecordStore: Send + 'static {
    /// Error returned when a write is rejected.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Commit all records of `file` or none of them.
    fn write_parsed(&mut self, file: &ParsedFile) -> Result<WriteReport, Self::Error>;
}

impl RecordStore for Store {
    type Error = calbench_store::Error;

    fn write_parsed(&mut self, file: &ParsedFile) -> Result<WriteReport, Self::Error> {
        Store::write_parsed(self, file)
    }
}
