pub mod accounts;
pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod polls;
pub mod posts;
pub mod rooms;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use agora_policy::{Decision, Principal};
use agora_types::api::Claims;

use crate::error::ApiError;

pub(crate) fn principal(claims: &Claims) -> Principal {
    Principal {
        account_id: claims.sub,
        role: claims.role,
    }
}

pub(crate) fn ensure(decision: Decision) -> Result<(), ApiError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(ApiError::Forbidden),
    }
}

/// Row ids are written by us as UUID text; anything else in the column
/// is corruption and surfaces as a 500, never as a nil sentinel that
/// could leak into an ownership comparison.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(format!("corrupt id '{raw}': {e}")))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
/// timezone; RFC 3339 appears where we wrote the value ourselves.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{raw}': {e}");
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_uuid_text() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parse_id_surfaces_corrupt_text_as_internal() {
        match parse_id("not-a-uuid") {
            Err(ApiError::Internal(_)) => {}
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    fn parse_timestamp_handles_both_stored_shapes() {
        let sqlite = parse_timestamp("2026-08-30 12:00:00");
        let rfc3339 = parse_timestamp("2026-08-30T12:00:00Z");
        assert_eq!(sqlite, rfc3339);
    }
}
