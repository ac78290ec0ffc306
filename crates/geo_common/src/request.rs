use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{GeoBounds, Result, ValidationError};

/// A change detection request as it arrives from a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    /// Query extent `[minX, minY, maxX, maxY]`
    pub bounds: Vec<f64>,
    /// Capture date of the "before" snapshot
    pub before_date: String,
    /// Capture date of the "after" snapshot
    pub after_date: String,
}

/// A request that passed boundary validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub bounds: GeoBounds,
    pub before_date: String,
    pub after_date: String,
}

impl DetectionRequest {
    /// Check bounds and dates before any imagery is fetched.
    ///
    /// Dates are kept verbatim (they become part of the cache key and the
    /// imagery `TIME` parameter); they only have to parse and be in order.
    pub fn validate(&self) -> Result<ValidatedRequest> {
        if self.bounds.is_empty() {
            return Err(ValidationError::MissingParameter("bounds"));
        }
        let bounds = GeoBounds::from_slice(&self.bounds)?;

        let before = parse_date("beforeDate", &self.before_date)?;
        let after = parse_date("afterDate", &self.after_date)?;
        if before > after {
            return Err(ValidationError::DateOrder {
                before: self.before_date.clone(),
                after: self.after_date.clone(),
            });
        }

        Ok(ValidatedRequest {
            bounds,
            before_date: self.before_date.trim().to_string(),
            after_date: self.after_date.trim().to_string(),
        })
    }
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
pub fn parse_date(field: &'static str, value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingParameter(field));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bounds: Vec<f64>, before: &str, after: &str) -> DetectionRequest {
        DetectionRequest {
            bounds,
            before_date: before.to_string(),
            after_date: after.to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        let validated = request(vec![0.0, 0.0, 100.0, 100.0], "2023-01-01", "2024-01-01")
            .validate()
            .expect("Should validate");
        assert_eq!(validated.bounds.to_array(), [0.0, 0.0, 100.0, 100.0]);
        assert_eq!(validated.before_date, "2023-01-01");
        assert_eq!(validated.after_date, "2024-01-01");
    }

    #[test]
    fn test_missing_parameters() {
        assert_eq!(
            request(vec![], "2023-01-01", "2024-01-01").validate(),
            Err(ValidationError::MissingParameter("bounds"))
        );
        assert_eq!(
            request(vec![0.0, 0.0, 1.0, 1.0], "", "2024-01-01").validate(),
            Err(ValidationError::MissingParameter("beforeDate"))
        );
    }

    #[test]
    fn test_wrong_bounds_length() {
        assert_eq!(
            request(vec![0.0, 0.0, 1.0], "2023-01-01", "2024-01-01").validate(),
            Err(ValidationError::BoundsLength(3))
        );
    }

    #[test]
    fn test_reversed_dates_rejected() {
        let err = request(vec![0.0, 0.0, 1.0, 1.0], "2024-01-01", "2023-01-01")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::DateOrder { .. }));
    }

    #[test]
    fn test_same_day_and_rfc3339_dates() {
        assert!(request(vec![0.0, 0.0, 1.0, 1.0], "2024-01-01", "2024-01-01")
            .validate()
            .is_ok());
        assert!(request(
            vec![0.0, 0.0, 1.0, 1.0],
            "2024-01-01T00:00:00Z",
            "2024-06-01T12:30:00+02:00"
        )
        .validate()
        .is_ok());
    }

    #[test]
    fn test_garbage_date_rejected() {
        let err = request(vec![0.0, 0.0, 1.0, 1.0], "yesterday", "2024-01-01")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDate {
                field: "beforeDate",
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn test_camel_case_json() {
        let json = r#"{"bounds":[0,0,100,100],"beforeDate":"2023-01-01","afterDate":"2024-01-01"}"#;
        let parsed: DetectionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.bounds, vec![0.0, 0.0, 100.0, 100.0]);
        assert_eq!(parsed.after_date, "2024-01-01");
    }
}
