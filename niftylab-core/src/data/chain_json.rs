//! Exchange option-chain JSON payloads.
//!
//! Shape: `{"records": {"underlyingValue": f64, "expiryDates": [..], "data": [
//! {"strikePrice": .., "CE": {..}, "PE": {..}}, ..]}}`. Unknown fields are
//! ignored; a missing `records` object is an error.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::provider::{ChainPayload, DataError};
use crate::domain::{ChainRow, OptionChain};

#[derive(Debug, Deserialize)]
struct Envelope {
    records: Records,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Records {
    #[serde(default)]
    underlying_value: Option<f64>,
    #[serde(default)]
    expiry_dates: Vec<String>,
    #[serde(default)]
    data: Vec<ChainRow>,
}

/// Parse a raw payload into a chain, keeping the bytes for hashing.
pub fn parse_chain(raw: &[u8]) -> Result<ChainPayload, DataError> {
    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|e| DataError::ChainPayload(e.to_string()))?;
    let Records {
        underlying_value,
        expiry_dates,
        data,
    } = envelope.records;
    Ok(ChainPayload {
        chain: OptionChain {
            underlying_value: underlying_value.filter(|v| v.is_finite() && *v > 0.0),
            expiries: expiry_dates,
            rows: data,
        },
        raw: raw.to_vec(),
    })
}

pub fn load_chain_file(path: &Path) -> Result<ChainPayload, DataError> {
    let raw = fs::read(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_chain(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    const PAYLOAD: &str = r#"{
        "records": {
            "expiryDates": ["07-Mar-2024", "14-Mar-2024"],
            "underlyingValue": 22338.75,
            "timestamp": "01-Mar-2024 15:30:00",
            "data": [
                {"strikePrice": 22300, "expiryDate": "07-Mar-2024",
                 "CE": {"lastPrice": 110.5, "openInterest": 52000, "totalTradedVolume": 310000, "impliedVolatility": 12.1},
                 "PE": {"lastPrice": 72.0, "openInterest": 61000, "totalTradedVolume": 280000}},
                {"strikePrice": 22400,
                 "CE": {"lastPrice": 61.2, "openInterest": 80000, "totalTradedVolume": 400000}}
            ]
        },
        "filtered": {"data": []}
    }"#;

    #[test]
    fn parses_exchange_payload() {
        let payload = parse_chain(PAYLOAD.as_bytes()).unwrap();
        let chain = &payload.chain;
        assert_eq!(chain.underlying_value, Some(22_338.75));
        assert_eq!(chain.expiries.len(), 2);
        assert_eq!(chain.strikes(), vec![22_300, 22_400]);
        assert_eq!(chain.ltp(22_300, Side::Ce), 110.5);
        assert_eq!(chain.ltp(22_400, Side::Pe), 0.0);
        assert_eq!(payload.raw, PAYLOAD.as_bytes());
    }

    #[test]
    fn missing_records_is_an_error() {
        assert!(matches!(
            parse_chain(br#"{"filtered": {}}"#),
            Err(DataError::ChainPayload(_))
        ));
        assert!(parse_chain(b"<html>blocked</html>").is_err());
    }

    #[test]
    fn empty_records_parse_to_empty_chain() {
        let payload = parse_chain(br#"{"records": {}}"#).unwrap();
        assert!(payload.chain.is_empty());
        assert_eq!(payload.chain.underlying_value, None);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NIFTY_2024-03-01.json");
        fs::write(&path, PAYLOAD).unwrap();
        assert_eq!(load_chain_file(&path).unwrap().chain.rows.len(), 2);
        assert!(matches!(
            load_chain_file(&dir.path().join("missing.json")),
            Err(DataError::Io { .. })
        ));
    }
}
