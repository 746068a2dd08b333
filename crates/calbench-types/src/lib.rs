//! Record model for calibration bench files.
//!
//! This crate provides the shared, I/O-free types used by the parser,
//! the classifier and the record store.
//!
//! # Features
//!
//! - File kinds and bench naming convention
//! - Canonical sensor model families and the model catalog
//! - Characterisation, coefficient and verification records
//! - Parse warnings, parse errors and duplication outcomes

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::ModelCatalog;
pub use error::{ParseError, ParseResult};
pub use types::{
    CharacterisationReading, CoefficientEntry, DataKind, DuplicationOutcome, FileKind,
    MissingFields, ModelFamily, ParseReport, ParseWarning, ParsedBody, ParsedFile, RowCounts,
    SensorHeader, UNSPECIFIED, VerificationReading, WarningCategory, WriteReport,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;

    // --- FileKind tests ---

    #[test]
    fn test_file_kind_from_prefix() {
        assert_eq!(
            FileKind::from_file_name("CH_FN_00123_2024.txt"),
            Some(FileKind::Characterisation)
        );
        assert_eq!(
            FileKind::from_file_name("VR_FN_00123.txt"),
            Some(FileKind::Verification)
        );
    }

    #[test]
    fn test_file_kind_rejects_other_names() {
        assert_eq!(FileKind::from_file_name("ch_fn_00123.txt"), None);
        assert_eq!(FileKind::from_file_name("CH_FN_00123"), None);
        assert_eq!(FileKind::from_file_name("CH_FN_00123.txt.bak"), None);
        assert_eq!(FileKind::from_file_name("notes.txt"), None);
        assert_eq!(FileKind::from_file_name(""), None);
    }

    #[test]
    fn test_file_kind_extension_case_insensitive() {
        assert_eq!(
            FileKind::from_file_name("CH_FN_1.Txt"),
            Some(FileKind::Characterisation)
        );
    }

    // --- ModelFamily tests ---

    #[test]
    fn test_family_eni100_substring() {
        assert_eq!(ModelFamily::from_type("ЭнИ-100"), ModelFamily::EnI100);
        assert_eq!(ModelFamily::from_type("ЭНИ-100-Ex"), ModelFamily::EnI100);
        assert_eq!(ModelFamily::canonical_type(" ЭНИ-100-Ex "), "ЭнИ-100");
    }

    #[test]
    fn test_family_eni12_requires_exact_name() {
        assert_eq!(ModelFamily::from_type("ЭНИ-12"), ModelFamily::EnI12);
        assert_eq!(ModelFamily::from_type("ЭНИ-12М"), ModelFamily::EnI12M);
        assert_eq!(ModelFamily::from_type("ЭНИ-12-Ex"), ModelFamily::Unknown);
        assert_eq!(ModelFamily::canonical_type("ЭНИ-12М"), "ЭнИ-12М");
    }

    #[test]
    fn test_family_unknown_keeps_raw_text() {
        assert_eq!(ModelFamily::canonical_type(" АИР-20 "), "АИР-20");
        assert_eq!(ModelFamily::canonical_type(UNSPECIFIED), UNSPECIFIED);
        assert_eq!(ModelFamily::Unknown.tag(), None);
    }

    // --- RowCounts / DuplicationOutcome tests ---

    #[test]
    fn test_row_counts_accumulate() {
        let mut a = RowCounts::default();
        a.add(DataKind::Characterisation, 3);
        a.add(DataKind::Coefficients, 2);
        let mut b = RowCounts::default();
        b.add(DataKind::Verification, 4);
        a += b;
        assert_eq!(a.total(), 9);
        assert_eq!(a.get(DataKind::Verification), 4);
    }

    #[test]
    fn test_outcome_empty_file_is_clean() {
        assert_eq!(
            DuplicationOutcome::from_counts(0, 0),
            DuplicationOutcome::Clean
        );
    }

    // --- ParseWarning tests ---

    #[test]
    fn test_warning_category_keys_fields_separately() {
        let a = ParseWarning::MissingField {
            field: "voltage".into(),
        };
        let b = ParseWarning::MissingField {
            field: "resistance".into(),
        };
        assert_ne!(a.category(), b.category());
        let c = ParseWarning::CoefficientCountMismatch {
            declared: 3,
            found: 2,
        };
        let d = ParseWarning::CoefficientCountMissing { line: 10 };
        assert_eq!(c.category(), d.category());
    }

    #[test]
    fn test_warning_display_mentions_model() {
        let w = ParseWarning::UnknownModel {
            sensor_type: "ЭнИ-12".into(),
            model: "XYZ".into(),
        };
        assert!(w.to_string().contains("XYZ"));
    }

    // --- Serialization tests ---

    #[test]
    fn test_parsed_body_serialization_tagged() {
        let body = ParsedBody::Verification {
            readings: vec![VerificationReading {
                timestamp: datetime!(2024-03-01 10:00:00),
                temperature: 20.0,
                npi: 0.0,
                vpi: 1.6,
                pressure_given: 0.8,
                pressure_real: 0.801,
                current_given: 12.0,
                current_real: 12.01,
                voltage: 24.0,
                resistance: 250.0,
            }],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"kind\":\"verification\""));
        assert_eq!(body.reading_count(), 1);
        assert_eq!(body.row_count(), 1);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::FirstReading {
            line: 5,
            reason: "bad date".into(),
        };
        assert_eq!(err.to_string(), "Invalid first reading at line 5: bad date");
    }

    proptest! {
        #[test]
        fn prop_from_file_name_never_panics(name in "\\PC{0,40}") {
            let _ = FileKind::from_file_name(&name);
        }

        #[test]
        fn prop_canonical_type_is_idempotent(raw in "\\PC{0,20}") {
            let once = ModelFamily::canonical_type(&raw);
            prop_assert_eq!(ModelFamily::canonical_type(&once), once.clone());
        }
    }
}
