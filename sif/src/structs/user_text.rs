//! Instrument parameters embedded in the free-form user text.
//!
//! Acquisition software appends `Name: value` (or `Name = value`) lines to
//! the user text for a handful of spectrograph and intensifier settings.
//! Names are matched case-insensitively, ignoring blanks and underscores.

use log::{debug, trace};

use crate::structs::metadata::{Metadata, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Float,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrumentParameter {
    /// Name as it appears in the user text, normalized.
    pub pattern: &'static str,
    /// Metadata key the value is stored under.
    pub key: &'static str,
    pub kind: ParameterKind,
}

pub const INSTRUMENT_PARAMETERS: &[InstrumentParameter] = &[
    InstrumentParameter {
        pattern: "grating",
        key: "Grating",
        kind: ParameterKind::Text,
    },
    InstrumentParameter {
        pattern: "spectrograph",
        key: "SpectrographId",
        kind: ParameterKind::Text,
    },
    InstrumentParameter {
        pattern: "gatewidth",
        key: "GateWidth",
        kind: ParameterKind::Float,
    },
    InstrumentParameter {
        pattern: "gatedelay",
        key: "GateDelay",
        kind: ParameterKind::Float,
    },
    InstrumentParameter {
        pattern: "gategain",
        key: "GateGain",
        kind: ParameterKind::Float,
    },
    InstrumentParameter {
        pattern: "ramanexwavelength",
        key: "RamanExWavelength",
        kind: ParameterKind::Float,
    },
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let split = line.find([':', '='])?;
    let (name, value) = line.split_at(split);

    Some((name.trim(), value[1..].trim()))
}

/// Scans `user_text` and inserts every recognized parameter into `metadata`.
///
/// The first occurrence of a name wins. Values that do not parse as the
/// expected kind are left out.
pub fn scan_instrument_parameters(user_text: &[u8], metadata: &mut Metadata) {
    let text = String::from_utf8_lossy(user_text);

    for line in text.lines() {
        let Some((name, value)) = split_assignment(line) else {
            continue;
        };

        let name = normalize(name);
        let Some(param) = INSTRUMENT_PARAMETERS.iter().find(|p| p.pattern == name) else {
            continue;
        };

        if metadata.contains_key(param.key) {
            continue;
        }

        let value = match param.kind {
            ParameterKind::Float => match value.parse::<f64>() {
                Ok(v) => Value::Float(v),
                Err(_) => {
                    debug!("Ignoring non-numeric {} in user text: {value:?}", param.key);
                    continue;
                }
            },
            ParameterKind::Text => Value::Bytes(value.as_bytes().to_vec()),
        };

        trace!("User text: {} = {value}", param.key);
        metadata.insert(param.key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_parameters() {
        let text = b"Sample run 7\nGrating: 300 l/mm\nSpectrograph: SR303i\n\
                     Gate Width = 5e-9\ngate_delay: 1.5e-8\nGate Gain: 2500\n\
                     Raman Ex Wavelength: 785\n";
        let mut metadata = Metadata::new();
        scan_instrument_parameters(text, &mut metadata);

        assert_eq!(metadata.get("Grating").and_then(Value::as_text).as_deref(), Some("300 l/mm"));
        assert_eq!(
            metadata.get("SpectrographId").and_then(Value::as_text).as_deref(),
            Some("SR303i")
        );
        assert_eq!(metadata.get_float("GateWidth"), Some(5e-9));
        assert_eq!(metadata.get_float("GateDelay"), Some(1.5e-8));
        assert_eq!(metadata.get_float("GateGain"), Some(2500.0));
        assert_eq!(metadata.get_float("RamanExWavelength"), Some(785.0));

        let keys: Vec<_> = metadata.keys().collect();
        assert_eq!(
            keys,
            [
                "Grating",
                "SpectrographId",
                "GateWidth",
                "GateDelay",
                "GateGain",
                "RamanExWavelength"
            ]
        );
    }

    #[test]
    fn test_unrecognized_and_malformed_lines_are_ignored() {
        let text = b"Calibration data for frame 1: 1,2,3\nGate Width: wide\nOperator: me\n";
        let mut metadata = Metadata::new();
        scan_instrument_parameters(text, &mut metadata);

        assert!(metadata.is_empty());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut metadata = Metadata::new();
        scan_instrument_parameters(b"Gate Gain: 10\nGate Gain: 20\n", &mut metadata);

        assert_eq!(metadata.get_float("GateGain"), Some(10.0));
    }
}
