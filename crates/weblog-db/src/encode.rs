//! Conversions between domain values and their SQLite text encodings.

use anyhow::{Result, anyhow};
use chrono::{NaiveDateTime, SubsecRound, Utc};

use weblog_types::models::{RelationshipStatus, RelationshipType};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Current UTC time at the precision the store keeps.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(3)
}

pub fn encode_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn decode_ts(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        // Rows written by SQLite's own datetime('now') carry no fraction.
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", raw, e))
}

pub fn decode_status(raw: &str) -> Result<RelationshipStatus> {
    RelationshipStatus::parse(raw).ok_or_else(|| anyhow!("unknown relationship status '{}'", raw))
}

pub fn decode_kind(raw: &str) -> Result<RelationshipType> {
    RelationshipType::parse(raw).ok_or_else(|| anyhow!("unknown relationship type '{}'", raw))
}
