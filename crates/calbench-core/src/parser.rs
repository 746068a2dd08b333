//! Text parser for bench files.
//!
//! A bench file is line oriented:
//!
//! ```text
//! Стенд характеризации v2                          <- banner
//! Канал: 3; Зав. номер: 40512; Тип: ЭнИ-100; Модель: ДИ
//! ...
//! 01.03.2024 08:00:00 | 20,0 | 1 | 0,0 | 10,5 | 5000 | 0,01
//! 01.03.2024 09:00:00 | 25,0 | 1 | 0,5 | 11,0 | 5010 | 0,02
//! Коэффициенты датчика
//! Количество: 2
//! 0: 1,25
//! 1: -0,003
//! ```
//!
//! Readings start at a fixed line that depends on the file kind. Row level
//! problems never fail the file: the row is skipped and reported once per
//! file as a [`ParseWarning`]. Only a broken header, a broken first reading
//! or the absence of readings are fatal.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use time::macros::format_description;

use calbench_types::{
    CharacterisationReading, CoefficientEntry, FileKind, MissingFields, ModelCatalog, ModelFamily,
    ParseError, ParseReport, ParseResult, ParseWarning, ParsedBody, ParsedFile, SensorHeader, UNSPECIFIED,
    VerificationReading, WarningCategory,
};

/// Marker that opens the coefficient block of a characterisation file.
pub const DEFAULT_COEFFICIENT_MARKER: &str = "Коэффициенты датчика";

/// Layout knobs for the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// 0-based line index of the first characterisation reading.
    pub characterisation_start: usize,
    /// 0-based line index of the first verification reading.
    pub verification_start: usize,
    /// Phrases that open the coefficient block.
    pub coefficient_markers: Vec<String>,
    /// Known models per family.
    #[serde(skip)]
    pub catalog: ModelCatalog,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            characterisation_start: 4,
            verification_start: 5,
            coefficient_markers: vec![
                DEFAULT_COEFFICIENT_MARKER.to_string(),
                "Sensor coefficients".to_string(),
            ],
            catalog: ModelCatalog::default(),
        }
    }
}

impl ParserOptions {
    /// Use a different model catalog.
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Line index where readings of `kind` begin.
    pub fn start_line(&self, kind: FileKind) -> usize {
        match kind {
            FileKind::Characterisation => self.characterisation_start,
            FileKind::Verification => self.verification_start,
        }
    }

    fn is_coefficient_marker(&self, line: &str) -> bool {
        self.coefficient_markers
            .iter()
            .any(|marker| !marker.is_empty() && line.contains(marker.as_str()))
    }
}

/// Parse the text of a whole file.
///
/// A leading byte order mark is ignored and both `\n` and `\r\n` line
/// endings are accepted.
pub fn parse_str(text: &str, kind: FileKind, options: &ParserOptions) -> ParseResult<ParsedFile> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();
    parse(&lines, kind, options)
}

/// Parse the lines of a bench file.
///
/// # Errors
///
/// - [`ParseError::MissingHeader`] if line 2 is absent
/// - [`ParseError::MissingSerial`] if the header has no serial number
/// - [`ParseError::FirstReading`] if the first reading row is malformed, or
///   a coefficient block appears before any reading
/// - [`ParseError::NoReadings`] if no reading row was found
pub fn parse<S: AsRef<str>>(
    lines: &[S],
    kind: FileKind,
    options: &ParserOptions,
) -> ParseResult<ParsedFile> {
    let mut diag = Diagnostics::default();
    let header = parse_header(lines, options, &mut diag)?;

    let body = match kind {
        FileKind::Characterisation => parse_characterisation(lines, options, &mut diag)?,
        FileKind::Verification => parse_verification(lines, options, &mut diag)?,
    };

    Ok(ParsedFile {
        kind,
        header,
        body,
        report: diag.report,
    })
}

/// Per-file warning collector. Each category is reported once.
#[derive(Default)]
struct Diagnostics {
    seen: HashSet<WarningCategory>,
    report: ParseReport,
}

impl Diagnostics {
    fn warn(&mut self, warning: ParseWarning) {
        if self.seen.insert(warning.category()) {
            self.report.warnings.push(warning);
        }
    }

    fn skip_row(&mut self, line: usize, reason: String) {
        self.report.skipped_rows += 1;
        self.warn(ParseWarning::MalformedRow { line, reason });
    }
}

fn parse_header<S: AsRef<str>>(
    lines: &[S],
    options: &ParserOptions,
    diag: &mut Diagnostics,
) -> ParseResult<SensorHeader> {
    let banner = lines
        .first()
        .map(|l| l.as_ref().trim().to_string())
        .unwrap_or_default();
    let line = lines.get(1).ok_or(ParseError::MissingHeader)?.as_ref();
    let fields: Vec<&str> = line.split(';').collect();

    let channel = fields
        .first()
        .and_then(|f| field_value(f).parse::<i64>().ok());
    let serial_number = fields
        .get(1)
        .copied()
        .map(field_value)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingSerial)?
        .to_string();

    let raw_type = optional_field(&fields, 2);
    let raw_model = optional_field(&fields, 3);

    let mut missing = Vec::new();
    if raw_type.is_none() {
        missing.push("type".to_string());
    }
    if raw_model.is_none() {
        missing.push("model".to_string());
    }
    if !missing.is_empty() {
        diag.warn(ParseWarning::IncompleteHeader { missing });
    }

    let family = raw_type.map(ModelFamily::from_type).unwrap_or(ModelFamily::Unknown);
    let sensor_type = raw_type
        .map(ModelFamily::canonical_type)
        .unwrap_or_else(|| UNSPECIFIED.to_string());
    let model = raw_model.unwrap_or(UNSPECIFIED).to_string();

    if options.catalog.is_nonstandard(family, &model) {
        diag.warn(ParseWarning::UnknownModel {
            sensor_type: sensor_type.clone(),
            model: model.clone(),
        });
    }

    Ok(SensorHeader {
        banner,
        channel,
        serial_number,
        sensor_type,
        model,
        family,
    })
}

/// Text after the first `:`, trimmed. A field without a label is taken whole.
fn field_value(field: &str) -> &str {
    field
        .split_once(':')
        .map(|(_, value)| value)
        .unwrap_or(field)
        .trim()
}

fn optional_field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields
        .get(index)
        .copied()
        .map(field_value)
        .filter(|v| !v.is_empty() && *v != UNSPECIFIED)
}

enum Section {
    Readings,
    CoefficientCount,
    Coefficients,
}

fn parse_characterisation<S: AsRef<str>>(
    lines: &[S],
    options: &ParserOptions,
    diag: &mut Diagnostics,
) -> ParseResult<ParsedBody> {
    let mut readings = Vec::new();
    let mut coefficients = Vec::new();
    let mut section = Section::Readings;
    let mut seen_row = false;
    let mut effective_date = None;
    let mut declared = None;
    let mut last_line = 0;

    let start = options.start_line(FileKind::Characterisation);
    for (idx, raw) in lines.iter().enumerate().skip(start) {
        let line_no = idx + 1;
        let line = raw.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        last_line = line_no;

        match section {
            Section::Readings => {
                if options.is_coefficient_marker(line) {
                    let Some(last) = readings.last().map(|r: &CharacterisationReading| r.timestamp)
                    else {
                        return Err(ParseError::FirstReading {
                            line: line_no,
                            reason: "coefficient block before any reading".to_string(),
                        });
                    };
                    effective_date = Some(last);
                    section = Section::CoefficientCount;
                    continue;
                }
                if !line.contains('|') {
                    continue;
                }
                let columns: Vec<&str> = line.split('|').map(str::trim).collect();
                match characterisation_row(&columns, diag) {
                    Ok(reading) => readings.push(reading),
                    Err(reason) if !seen_row => {
                        return Err(ParseError::FirstReading {
                            line: line_no,
                            reason,
                        });
                    }
                    Err(reason) => diag.skip_row(line_no, reason),
                }
                seen_row = true;
            }
            Section::CoefficientCount => {
                match field_value(line).parse::<usize>() {
                    Ok(count) => declared = Some(count),
                    Err(_) => diag.warn(ParseWarning::CoefficientCountMissing { line: line_no }),
                }
                section = Section::Coefficients;
            }
            Section::Coefficients => {
                let Some((index, value)) = line.split_once(':') else {
                    continue;
                };
                let entry = index
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .zip(parse_number(value));
                match (entry, effective_date) {
                    (Some((index, value)), Some(effective_date)) => {
                        coefficients.push(CoefficientEntry {
                            index,
                            value,
                            effective_date,
                        })
                    }
                    _ => diag.skip_row(line_no, format!("malformed coefficient '{line}'")),
                }
            }
        }
    }

    if readings.is_empty() {
        return Err(ParseError::NoReadings);
    }

    match section {
        Section::CoefficientCount => {
            diag.warn(ParseWarning::CoefficientCountMissing {
                line: last_line + 1,
            });
        }
        Section::Coefficients => {
            if let Some(declared) = declared
                && declared != coefficients.len()
            {
                diag.warn(ParseWarning::CoefficientCountMismatch {
                    declared,
                    found: coefficients.len(),
                });
            }
        }
        Section::Readings => {}
    }

    Ok(ParsedBody::Characterisation {
        readings,
        coefficients,
    })
}

fn parse_verification<S: AsRef<str>>(
    lines: &[S],
    options: &ParserOptions,
    diag: &mut Diagnostics,
) -> ParseResult<ParsedBody> {
    let mut readings = Vec::new();
    let mut seen_row = false;

    let start = options.start_line(FileKind::Verification);
    for (idx, raw) in lines.iter().enumerate().skip(start) {
        let line_no = idx + 1;
        let line = raw.as_ref().trim();
        if line.is_empty() || !line.contains('|') {
            continue;
        }

        let columns: Vec<&str> = line.split('|').map(str::trim).collect();
        match verification_row(&columns, diag) {
            Ok(reading) => readings.push(reading),
            Err(reason) if !seen_row => {
                return Err(ParseError::FirstReading {
                    line: line_no,
                    reason,
                });
            }
            Err(reason) => diag.skip_row(line_no, reason),
        }
        seen_row = true;
    }

    if readings.is_empty() {
        return Err(ParseError::NoReadings);
    }
    Ok(ParsedBody::Verification { readings })
}

fn characterisation_row(
    columns: &[&str],
    diag: &mut Diagnostics,
) -> Result<CharacterisationReading, String> {
    let timestamp = required_timestamp(columns)?;
    let temperature = required_number(columns, 1, "temperature")?;
    let range = columns
        .get(2)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| "invalid range".to_string())?;
    let pressure = required_number(columns, 3, "pressure")?;
    let voltage = optional_number(columns, 4, "voltage", diag);
    let resistance = optional_number(columns, 5, "resistance", diag);
    let deviation = optional_number(columns, 6, "deviation", diag);

    Ok(CharacterisationReading {
        timestamp,
        temperature,
        range,
        pressure,
        voltage: voltage.unwrap_or_default(),
        resistance: resistance.unwrap_or_default(),
        deviation: deviation.unwrap_or_default(),
        missing: MissingFields {
            voltage: voltage.is_none(),
            resistance: resistance.is_none(),
            deviation: deviation.is_none(),
        },
    })
}

fn verification_row(
    columns: &[&str],
    diag: &mut Diagnostics,
) -> Result<VerificationReading, String> {
    Ok(VerificationReading {
        timestamp: required_timestamp(columns)?,
        temperature: required_number(columns, 1, "temperature")?,
        npi: required_number(columns, 2, "npi")?,
        vpi: required_number(columns, 3, "vpi")?,
        pressure_given: required_number(columns, 4, "pressure_given")?,
        pressure_real: required_number(columns, 5, "pressure_real")?,
        current_given: required_number(columns, 6, "current_given")?,
        current_real: required_number(columns, 7, "current_real")?,
        voltage: optional_number(columns, 8, "voltage", diag).unwrap_or_default(),
        resistance: optional_number(columns, 9, "resistance", diag).unwrap_or_default(),
    })
}

fn required_timestamp(columns: &[&str]) -> Result<PrimitiveDateTime, String> {
    let raw = columns.first().copied().unwrap_or_default();
    parse_timestamp(raw).ok_or_else(|| format!("invalid date-time '{raw}'"))
}

fn required_number(columns: &[&str], index: usize, name: &str) -> Result<f64, String> {
    match columns.get(index) {
        Some(raw) => parse_number(raw).ok_or_else(|| format!("invalid {name} '{raw}'")),
        None => Err(format!("missing {name}")),
    }
}

fn optional_number(
    columns: &[&str],
    index: usize,
    name: &str,
    diag: &mut Diagnostics,
) -> Option<f64> {
    let value = columns.get(index).and_then(|raw| parse_number(raw));
    if value.is_none() {
        diag.warn(ParseWarning::MissingField {
            field: name.to_string(),
        });
    }
    value
}

/// Parse a decimal that may use `,` as the separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a bench date-time in any of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    PrimitiveDateTime::parse(
        raw,
        format_description!(
            "[day padding:none].[month padding:none].[year] [hour padding:none]:[minute]:[second]"
        ),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!(
                "[day padding:none].[month padding:none].[year] [hour padding:none]:[minute]"
            ),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .ok()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Parsing arbitrary text must fail cleanly, never panic.
        #[test]
        fn parse_str_never_panics(text in "\\PC*") {
            let options = ParserOptions::default();
            let _ = parse_str(&text, FileKind::Characterisation, &options);
            let _ = parse_str(&text, FileKind::Verification, &options);
        }

        /// Random reading rows after a valid header never panic.
        #[test]
        fn parse_rows_never_panic(rows in proptest::collection::vec("[0-9.,:| -]{0,60}", 0..8)) {
            let mut text = String::from("Стенд\nКанал: 1; Зав. номер: 1; Тип: ЭнИ-100; Модель: ДИ\n\n\n");
            for row in &rows {
                text.push_str(row);
                text.push('\n');
            }
            if let Ok(file) = parse_str(&text, FileKind::Characterisation, &ParserOptions::default()) {
                prop_assert_eq!(file.header.channel, Some(1));
                prop_assert_eq!(file.header.serial_number.as_str(), "1");
                prop_assert_eq!(file.header.family, ModelFamily::EnI100);
            }
        }

        /// Comma and dot decimals parse to the same value.
        #[test]
        fn parse_number_accepts_comma_decimals(whole in -100_000i64..100_000, frac in 0u32..1000) {
            let dotted = format!("{whole}.{frac:03}");
            let comma = format!("{whole},{frac:03}");
            prop_assert_eq!(parse_number(&dotted), parse_number(&comma));
            prop_assert!(parse_number(&dotted).is_some());
        }
    }
}
