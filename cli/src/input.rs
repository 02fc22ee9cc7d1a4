use crate::error::{CliError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Args;
use csave_core::{Record, DEFAULT_PREAMBLE_SECS};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One entry of a records JSON file
///
/// ```json
/// [
///   { "preamble": 2.0, "text": "10 PRINT \"HELLO\"" },
///   { "base64": "AAEC/w==" }
/// ]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSpec {
    /// Preamble duration in seconds (default 1.0)
    pub preamble: Option<f64>,
    /// UTF-8 text payload
    pub text: Option<String>,
    /// Binary payload, standard base64
    pub base64: Option<String>,
}

impl RecordSpec {
    fn into_record(self, index: usize) -> Result<Record> {
        let payload = match (self.text, self.base64) {
            (Some(_), Some(_)) => {
                return Err(CliError::InvalidRecord {
                    index,
                    reason: "both \"text\" and \"base64\" given".to_string(),
                })
            }
            (Some(text), None) => text.into_bytes(),
            (None, Some(encoded)) => STANDARD.decode(encoded.trim())?,
            (None, None) => Vec::new(),
        };
        let preamble = self.preamble.unwrap_or(DEFAULT_PREAMBLE_SECS);
        Record::with_preamble(preamble, payload).map_err(|e| CliError::InvalidRecord {
            index,
            reason: e.to_string(),
        })
    }
}

/// Parse a JSON array of [`RecordSpec`]
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let specs: Vec<RecordSpec> = serde_json::from_str(json)?;
    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| spec.into_record(index))
        .collect()
}

pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let json = std::fs::read_to_string(path)?;
    parse_records(&json)
}

/// Where the bytes to save come from
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file with the raw payload bytes (stdin if no input is given)
    #[arg(value_name = "INPUT", conflicts_with_all = ["text", "records"])]
    pub input: Option<PathBuf>,

    /// Payload given as text (UTF-8 encoded)
    #[arg(short, long, conflicts_with = "records")]
    pub text: Option<String>,

    /// JSON file listing records ({"preamble", "text" | "base64"})
    #[arg(short, long, value_name = "RECORDS.JSON")]
    pub records: Option<PathBuf>,

    /// Preamble duration in seconds for the payload record
    #[arg(short, long, default_value_t = DEFAULT_PREAMBLE_SECS)]
    pub preamble: f64,

    /// Prepend a preamble-only header record
    #[arg(long)]
    pub header: bool,
}

impl InputArgs {
    pub fn load(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        if self.header {
            records.push(Record::header());
        }

        if let Some(path) = &self.records {
            let loaded = load_records(path)?;
            log::info!("Loaded {} record(s) from {}", loaded.len(), path.display());
            records.extend(loaded);
            return Ok(records);
        }

        let payload = match (&self.text, &self.input) {
            (Some(text), _) => text.as_bytes().to_vec(),
            (None, Some(path)) => std::fs::read(path)?,
            (None, None) => {
                let mut data = Vec::new();
                std::io::stdin().read_to_end(&mut data)?;
                data
            }
        };
        records.push(Record::with_preamble(self.preamble, payload)?);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_and_base64_records() {
        let records = parse_records(
            r#"[
                {"preamble": 2.5, "text": "AB"},
                {"base64": "AAEC/w=="},
                {}
            ]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].preamble_secs(), 2.5);
        assert_eq!(records[0].payload(), b"AB");
        assert_eq!(records[1].preamble_secs(), 1.0);
        assert_eq!(records[1].payload(), &[0x00, 0x01, 0x02, 0xFF]);
        assert!(records[2].payload().is_empty());
    }

    #[test]
    fn test_parse_rejects_both_payload_kinds() {
        let err = parse_records(r#"[{"text": "a", "base64": "YQ=="}]"#).unwrap_err();
        assert!(matches!(err, CliError::InvalidRecord { index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_negative_preamble() {
        let err = parse_records(r#"[{"text": "a"}, {"preamble": -1.0}]"#).unwrap_err();
        assert!(matches!(err, CliError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_bad_base64_and_unknown_fields() {
        assert!(matches!(
            parse_records(r#"[{"base64": "***"}]"#),
            Err(CliError::Base64(_))
        ));
        assert!(matches!(
            parse_records(r#"[{"bytes": [1, 2]}]"#),
            Err(CliError::Json(_))
        ));
    }

    #[test]
    fn test_text_input_with_header() {
        let args = InputArgs {
            input: None,
            text: Some("HI".to_string()),
            records: None,
            preamble: 0.5,
            header: true,
        };
        let records = args.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].payload().is_empty());
        assert_eq!(records[1].preamble_secs(), 0.5);
        assert_eq!(records[1].payload(), b"HI");
    }
}
