//! Core types for calibration bench records.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// Placeholder used by the benches for an absent type or model.
pub const UNSPECIFIED: &str = "-";

/// Kind of bench file, derived from its file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FileKind {
    /// Characterisation run (`CH_FN_*.txt`).
    Characterisation,
    /// Verification run (`VR_FN_*.txt`).
    Verification,
}

impl FileKind {
    /// File name prefix used by the benches for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            FileKind::Characterisation => "CH_FN_",
            FileKind::Verification => "VR_FN_",
        }
    }

    /// Detect the kind of a bench file from its name.
    ///
    /// The name must carry a known prefix and a `.txt` extension
    /// (case-insensitive). Anything else is not a bench file.
    ///
    /// # Examples
    ///
    /// ```
    /// use calbench_types::FileKind;
    ///
    /// assert_eq!(FileKind::from_file_name("CH_FN_1234.txt"), Some(FileKind::Characterisation));
    /// assert_eq!(FileKind::from_file_name("VR_FN_1234.TXT"), Some(FileKind::Verification));
    /// assert_eq!(FileKind::from_file_name("XX_FN_1234.txt"), None);
    /// assert_eq!(FileKind::from_file_name("CH_FN_1234.csv"), None);
    /// ```
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        if !ext.eq_ignore_ascii_case("txt") {
            return None;
        }
        [FileKind::Characterisation, FileKind::Verification]
            .into_iter()
            .find(|kind| stem.starts_with(kind.prefix()))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Characterisation => write!(f, "characterisation"),
            FileKind::Verification => write!(f, "verification"),
        }
    }
}

/// Class of stored data attached to a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataKind {
    /// Characterisation readings.
    Characterisation,
    /// Sensor coefficients.
    Coefficients,
    /// Verification readings.
    Verification,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Characterisation => write!(f, "characterisation"),
            DataKind::Coefficients => write!(f, "coefficients"),
            DataKind::Verification => write!(f, "verification"),
        }
    }
}

/// Canonical sensor model family.
///
/// The benches spell family names inconsistently; every spelling is folded
/// into one of these tags before a sensor identity is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModelFamily {
    /// ЭнИ-100 pressure transmitters.
    EnI100,
    /// ЭнИ-12 pressure transmitters.
    EnI12,
    /// ЭнИ-12М pressure transmitters.
    EnI12M,
    /// Anything the catalog does not know.
    Unknown,
}

impl ModelFamily {
    /// Classify a raw type string from a file header.
    ///
    /// # Examples
    ///
    /// ```
    /// use calbench_types::ModelFamily;
    ///
    /// assert_eq!(ModelFamily::from_type("ЭНИ-100-ДИ"), ModelFamily::EnI100);
    /// assert_eq!(ModelFamily::from_type("ЭНИ-12"), ModelFamily::EnI12);
    /// assert_eq!(ModelFamily::from_type("ЭнИ-12М"), ModelFamily::EnI12M);
    /// assert_eq!(ModelFamily::from_type("АИР-20"), ModelFamily::Unknown);
    /// ```
    #[must_use]
    pub fn from_type(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if upper.contains("ЭНИ-100") {
            ModelFamily::EnI100
        } else if upper == "ЭНИ-12М" {
            ModelFamily::EnI12M
        } else if upper == "ЭНИ-12" {
            ModelFamily::EnI12
        } else {
            ModelFamily::Unknown
        }
    }

    /// Canonical tag stored as the sensor type, if the family is known.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ModelFamily::EnI100 => Some("ЭнИ-100"),
            ModelFamily::EnI12 => Some("ЭнИ-12"),
            ModelFamily::EnI12M => Some("ЭнИ-12М"),
            ModelFamily::Unknown => None,
        }
    }

    /// Canonicalize a raw type string: known families collapse to their tag,
    /// anything else is kept as written (trimmed).
    #[must_use]
    pub fn canonical_type(raw: &str) -> String {
        Self::from_type(raw)
            .tag()
            .map(str::to_string)
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().unwrap_or("unknown"))
    }
}

/// Sensor descriptor taken from the header of a bench file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorHeader {
    /// First line of the file, kept as a format-version hint.
    pub banner: String,
    /// Bench channel the sensor was mounted on.
    pub channel: Option<i64>,
    /// Serial number; always non-empty.
    pub serial_number: String,
    /// Canonicalized sensor type, or `-` when absent.
    pub sensor_type: String,
    /// Model code, or `-` when absent.
    pub model: String,
    /// Model family derived from the type.
    pub family: ModelFamily,
}

/// One row of a characterisation run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharacterisationReading {
    /// Bench-local time of the measurement.
    pub timestamp: PrimitiveDateTime,
    /// Chamber temperature in °C.
    pub temperature: f64,
    /// Measurement range index.
    pub range: i64,
    /// Applied pressure.
    pub pressure: f64,
    /// Bridge voltage in mV.
    pub voltage: f64,
    /// Bridge resistance in Ω.
    pub resistance: f64,
    /// Deviation from the reference.
    pub deviation: f64,
    /// Optional columns absent from the row and stored as 0.0.
    #[cfg_attr(feature = "serde", serde(default))]
    pub missing: MissingFields,
}

/// Optional characterisation columns that were absent or unreadable.
///
/// Absent values are stored as 0.0 and must not be judged as measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MissingFields {
    pub voltage: bool,
    pub resistance: bool,
    pub deviation: bool,
}

impl MissingFields {
    /// True when every optional column was present.
    pub fn is_empty(&self) -> bool {
        !(self.voltage || self.resistance || self.deviation)
    }
}

/// One calibration coefficient computed by the bench.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoefficientEntry {
    /// Coefficient position.
    pub index: i64,
    /// Coefficient value.
    pub value: f64,
    /// Time of the last reading preceding the coefficient block.
    pub effective_date: PrimitiveDateTime,
}

/// One row of a verification run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VerificationReading {
    /// Bench-local time of the measurement.
    pub timestamp: PrimitiveDateTime,
    /// Chamber temperature in °C.
    pub temperature: f64,
    /// Lower range limit (НПИ).
    pub npi: f64,
    /// Upper range limit (ВПИ).
    pub vpi: f64,
    /// Pressure set point.
    pub pressure_given: f64,
    /// Pressure measured by the reference.
    pub pressure_real: f64,
    /// Expected loop current in mA.
    pub current_given: f64,
    /// Measured loop current in mA.
    pub current_real: f64,
    /// Supply voltage.
    pub voltage: f64,
    /// Load resistance.
    pub resistance: f64,
}

/// Records extracted from a bench file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ParsedBody {
    /// Characterisation readings and the optional coefficient block.
    Characterisation {
        readings: Vec<CharacterisationReading>,
        coefficients: Vec<CoefficientEntry>,
    },
    /// Verification readings.
    Verification { readings: Vec<VerificationReading> },
}

impl ParsedBody {
    /// Number of reading rows (coefficients excluded).
    pub fn reading_count(&self) -> usize {
        match self {
            ParsedBody::Characterisation { readings, .. } => readings.len(),
            ParsedBody::Verification { readings } => readings.len(),
        }
    }

    /// Number of candidate rows of every class.
    pub fn row_count(&self) -> usize {
        match self {
            ParsedBody::Characterisation {
                readings,
                coefficients,
            } => readings.len() + coefficients.len(),
            ParsedBody::Verification { readings } => readings.len(),
        }
    }
}

/// A fully parsed bench file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParsedFile {
    /// File kind.
    pub kind: FileKind,
    /// Sensor descriptor.
    pub header: SensorHeader,
    /// Readings and coefficients in file order.
    pub body: ParsedBody,
    /// Non-fatal problems encountered while parsing.
    pub report: ParseReport,
}

/// Non-fatal parse diagnostics for one file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseReport {
    /// Rows dropped because a mandatory field failed to parse.
    pub skipped_rows: usize,
    /// Deduplicated warnings, in the order first seen.
    pub warnings: Vec<ParseWarning>,
}

/// A non-fatal parse problem.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "warning", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ParseWarning {
    /// Header is missing the type and/or model field.
    IncompleteHeader { missing: Vec<String> },
    /// Type/model combination not in the model catalog.
    UnknownModel { sensor_type: String, model: String },
    /// Optional trailing field absent or malformed; defaulted to 0.0.
    MissingField { field: String },
    /// A reading row was skipped (first occurrence only).
    MalformedRow { line: usize, reason: String },
    /// Declared coefficient count differs from the entries present.
    CoefficientCountMismatch { declared: usize, found: usize },
    /// The coefficient count line could not be read.
    CoefficientCountMissing { line: usize },
}

impl ParseWarning {
    /// Category used to deduplicate warnings within one file.
    pub fn category(&self) -> WarningCategory {
        match self {
            ParseWarning::IncompleteHeader { .. } => WarningCategory::IncompleteHeader,
            ParseWarning::UnknownModel { .. } => WarningCategory::UnknownModel,
            ParseWarning::MissingField { field } => WarningCategory::MissingField(field.clone()),
            ParseWarning::MalformedRow { .. } => WarningCategory::MalformedRow,
            ParseWarning::CoefficientCountMismatch { .. } => WarningCategory::CoefficientCount,
            ParseWarning::CoefficientCountMissing { .. } => WarningCategory::CoefficientCount,
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::IncompleteHeader { missing } => {
                write!(f, "incomplete sensor info: missing {}", missing.join(", "))
            }
            ParseWarning::UnknownModel { sensor_type, model } => {
                write!(f, "non-standard model {model} for type {sensor_type}")
            }
            ParseWarning::MissingField { field } => {
                write!(f, "field '{field}' missing or malformed, defaulted to 0")
            }
            ParseWarning::MalformedRow { line, reason } => {
                write!(f, "skipped malformed row at line {line}: {reason}")
            }
            ParseWarning::CoefficientCountMismatch { declared, found } => {
                write!(f, "declared {declared} coefficients, found {found}")
            }
            ParseWarning::CoefficientCountMissing { line } => {
                write!(f, "unreadable coefficient count at line {line}")
            }
        }
    }
}

/// Deduplication key for [`ParseWarning`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarningCategory {
    IncompleteHeader,
    UnknownModel,
    MissingField(String),
    MalformedRow,
    CoefficientCount,
}

/// Row counters split by data class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RowCounts {
    pub characterisation: usize,
    pub coefficients: usize,
    pub verification: usize,
}

impl RowCounts {
    /// Sum over all classes.
    pub fn total(&self) -> usize {
        self.characterisation + self.coefficients + self.verification
    }

    /// Count for a single class.
    pub fn get(&self, kind: DataKind) -> usize {
        match kind {
            DataKind::Characterisation => self.characterisation,
            DataKind::Coefficients => self.coefficients,
            DataKind::Verification => self.verification,
        }
    }

    /// Add `n` rows to a class.
    pub fn add(&mut self, kind: DataKind, n: usize) {
        match kind {
            DataKind::Characterisation => self.characterisation += n,
            DataKind::Coefficients => self.coefficients += n,
            DataKind::Verification => self.verification += n,
        }
    }
}

impl std::ops::AddAssign for RowCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.characterisation += rhs.characterisation;
        self.coefficients += rhs.coefficients;
        self.verification += rhs.verification;
    }
}

/// Duplicate classification of a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DuplicationOutcome {
    /// No candidate row already existed.
    Clean,
    /// Some, but not all, candidate rows already existed.
    PartialDuplicate,
    /// Every candidate row already existed.
    FullDuplicate,
}

impl DuplicationOutcome {
    /// Derive the outcome from inserted and duplicate row totals.
    ///
    /// # Examples
    ///
    /// ```
    /// use calbench_types::DuplicationOutcome;
    ///
    /// assert_eq!(DuplicationOutcome::from_counts(5, 0), DuplicationOutcome::Clean);
    /// assert_eq!(DuplicationOutcome::from_counts(2, 3), DuplicationOutcome::PartialDuplicate);
    /// assert_eq!(DuplicationOutcome::from_counts(0, 5), DuplicationOutcome::FullDuplicate);
    /// ```
    #[must_use]
    pub fn from_counts(inserted: usize, duplicates: usize) -> Self {
        match (inserted, duplicates) {
            (_, 0) => DuplicationOutcome::Clean,
            (0, _) => DuplicationOutcome::FullDuplicate,
            _ => DuplicationOutcome::PartialDuplicate,
        }
    }
}

impl fmt::Display for DuplicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicationOutcome::Clean => write!(f, "clean"),
            DuplicationOutcome::PartialDuplicate => write!(f, "partial duplicate"),
            DuplicationOutcome::FullDuplicate => write!(f, "full duplicate"),
        }
    }
}

/// Result of committing one parsed file to the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriteReport {
    /// Sensor the rows were attached to.
    pub sensor_id: i64,
    /// Duplicate classification.
    pub outcome: DuplicationOutcome,
    /// Rows newly inserted.
    pub inserted: RowCounts,
    /// Rows discarded as duplicates.
    pub duplicates: RowCounts,
}
