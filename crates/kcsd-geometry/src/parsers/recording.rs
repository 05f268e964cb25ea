//! Parser for plain-text electrode recordings.
//!
//! One electrode per line, whitespace or comma separated:
//! ```text
//! # x    y    z    potential
//! 0.0  0.0  0.0  -0.5
//! 0.0  0.0  1.0   0.0
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Trailing columns
//! beyond the fourth are rejected so that misaligned exports fail loudly.

use std::path::Path;

use super::{ElectrodeSample, ParseError};

/// Parse a recording from a string.
pub fn parse_recording(content: &str) -> Result<Vec<ElectrodeSample>, ParseError> {
    let mut samples = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 4 {
            return Err(ParseError::FormatError {
                line: idx + 1,
                message: format!("Expected 'x y z potential', got '{}'", line),
            });
        }

        let mut values = [0.0_f64; 4];
        for (value, (part, name)) in values
            .iter_mut()
            .zip(parts.iter().zip(["x", "y", "z", "potential"]))
        {
            *value = part.parse().map_err(|_| ParseError::FormatError {
                line: idx + 1,
                message: format!("Invalid {} value: {}", name, part),
            })?;
            if !value.is_finite() {
                return Err(ParseError::FormatError {
                    line: idx + 1,
                    message: format!("Non-finite {} value: {}", name, part),
                });
            }
        }

        samples.push(ElectrodeSample {
            position: [values[0], values[1], values[2]],
            potential: values[3],
        });
    }

    Ok(samples)
}

/// Read and parse a recording file.
pub fn read_recording(path: &Path) -> Result<Vec<ElectrodeSample>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_recording(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_recording() {
        let content = "# header\n0 0 0 -0.5\n\n1.0, 0.5, 0.25, 0.2\n";
        let samples = parse_recording(content).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].potential, -0.5);
        assert_eq!(samples[1].position, [1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_missing_column_reports_line() {
        let content = "0 0 0 1\n0 0 1\n";
        match parse_recording(content) {
            Err(ParseError::FormatError { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number_rejected() {
        let content = "0 0 zero 1\n";
        assert!(matches!(
            parse_recording(content),
            Err(ParseError::FormatError { line: 1, .. })
        ));
    }

    #[test]
    fn test_nan_rejected() {
        assert!(parse_recording("0 0 0 NaN\n").is_err());
    }

    #[test]
    fn test_infinite_coordinate_rejected() {
        match parse_recording("0 0 0 1\n0 inf 0 1\n") {
            Err(ParseError::FormatError { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("Non-finite y"), "{message}");
            }
            other => panic!("Expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_values_keep_full_precision() {
        let samples = parse_recording("0.1 0.2 0.30000000000000004 -1e-300\n").unwrap();
        assert_eq!(samples[0].position[2], 0.1_f64 + 0.2_f64);
        assert_eq!(samples[0].potential, -1e-300);
    }
}
