use chrono::{DateTime, Utc};

use crate::error::{EdgeError, EdgeResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length for project identifiers taken from the path.
pub const MAX_PROJECT_ID_LENGTH: usize = 64;

/// Maximum length for event type strings.
pub const MAX_EVENT_TYPE_LENGTH: usize = 256;

/// Reject a reporting period whose start lies after its end.
///
/// Comparison is at whole-second precision; equal bounds are accepted.
pub fn ensure_period(start: DateTime<Utc>, end: DateTime<Utc>) -> EdgeResult<()> {
    if start.timestamp() > end.timestamp() {
        return Err(EdgeError::BadRequest(
            "startDate cannot be greater than endDate".to_string(),
        ));
    }

    Ok(())
}

/// Validate a project identifier used as a path parameter and metric label.
///
/// Rules:
/// - Must be between 1 and 64 characters
/// - Must start with an alphanumeric character
/// - Can contain alphanumeric characters, underscores, and hyphens
pub fn validate_project_id(project_id: &str) -> EdgeResult<()> {
    if project_id.is_empty() {
        return Err(EdgeError::BadRequest(
            "project id cannot be empty".to_string(),
        ));
    }

    if project_id.len() > MAX_PROJECT_ID_LENGTH {
        return Err(EdgeError::BadRequest(format!(
            "project id cannot exceed {MAX_PROJECT_ID_LENGTH} characters"
        )));
    }

    if !project_id
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(EdgeError::BadRequest(
            "project id must start with an alphanumeric character".to_string(),
        ));
    }

    if let Some((i, c)) = project_id
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(EdgeError::BadRequest(format!(
            "project id contains invalid character '{c}' at position {i}"
        )));
    }

    Ok(())
}

/// Validate an event type string.
///
/// Rules:
/// - Must be between 1 and 256 characters
/// - Must only contain printable ASCII characters (no control characters)
pub fn validate_event_type(event_type: &str) -> EdgeResult<()> {
    if event_type.is_empty() {
        return Err(EdgeError::BadRequest(
            "event_type cannot be empty".to_string(),
        ));
    }

    if event_type.len() > MAX_EVENT_TYPE_LENGTH {
        return Err(EdgeError::BadRequest(format!(
            "event_type cannot exceed {MAX_EVENT_TYPE_LENGTH} characters"
        )));
    }

    if let Some((i, c)) = event_type
        .char_indices()
        .find(|(_, c)| !c.is_ascii_graphic() && *c != ' ')
    {
        return Err(EdgeError::BadRequest(format!(
            "event_type contains invalid character at position {i}: {:?}",
            c
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_ensure_period_accepts_ordered_and_equal() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(ensure_period(start, start + Duration::days(1)).is_ok());
        assert!(ensure_period(start, start).is_ok());
        // Sub-second inversion is not an inversion at second precision.
        assert!(ensure_period(start + Duration::milliseconds(500), start).is_ok());
    }

    #[test]
    fn test_ensure_period_rejects_inverted() {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = ensure_period(end + Duration::seconds(1), end).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: startDate cannot be greater than endDate");
    }

    #[test]
    fn test_valid_project_ids() {
        for id in ["p1", "project-42", "01HXYZ_abc", "a"] {
            assert!(validate_project_id(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn test_invalid_project_ids() {
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("-leading").is_err());
        assert!(validate_project_id("has space").is_err());
        assert!(validate_project_id("a/b").is_err());
        assert!(validate_project_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_event_type_validation() {
        assert!(validate_event_type("user.created").is_ok());
        assert!(validate_event_type("").is_err());
        assert!(validate_event_type("bad\nvalue").is_err());
        assert!(validate_event_type(&"x".repeat(257)).is_err());
    }
}
