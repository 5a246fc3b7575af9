//! Scale link line protocol.
//!
//! The bottle's scale prints one weight per line. Bytes arrive in arbitrary
//! chunks, so a line is only complete once its newline has been seen.

use tracing::warn;

use crate::{IngestError, IngestResult};

/// Weight of the empty bottle assembly, in grams.
pub const DEFAULT_TARE_GRAMS: f64 = 19.68;

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every complete, trimmed, non-empty line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

/// Parse one scale line into grams of contents.
pub fn parse_reading(line: &str, tare: f64) -> IngestResult<f64> {
    let line = line.trim();
    match line.parse::<f64>() {
        Ok(raw) if raw.is_finite() => Ok(raw - tare),
        _ => {
            warn!(line, "non-numeric scale message");
            Err(IngestError::NonNumeric(line.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"45.2").is_empty());
        assert_eq!(buffer.pending(), "45.2");

        let lines = buffer.push(b"0\r\n\n  \n44.10\n43");
        assert_eq!(lines, vec!["45.20", "44.10"]);
        assert_eq!(buffer.pending(), "43");
    }

    #[test]
    fn test_parse_reading_subtracts_tare() {
        let grams = parse_reading(" 45.20 ", DEFAULT_TARE_GRAMS).unwrap();
        assert!((grams - 25.52).abs() < 1e-9);
    }

    #[test]
    fn test_parse_reading_rejects_text() {
        assert!(matches!(
            parse_reading("HX711 ready", DEFAULT_TARE_GRAMS),
            Err(IngestError::NonNumeric(line)) if line == "HX711 ready"
        ));
        assert!(parse_reading("NaN", DEFAULT_TARE_GRAMS).is_err());
    }
}
