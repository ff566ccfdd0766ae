use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use dunning_domain::pagination::PageRequest;

use crate::error::RetryServiceError;

pub mod audit;
pub mod health;
pub mod job;
pub mod opt_out;
pub mod rejection;
pub mod reminder;
pub mod reminder_policy;
pub mod retry_policy;
pub mod schedule;

/// Parse a raw query string with `serde_qs`; an absent query yields defaults.
pub(crate) fn parse_query<T: DeserializeOwned + Default>(
    raw: Option<String>,
) -> Result<T, RetryServiceError> {
    raw.as_deref()
        .map(serde_qs::from_str)
        .transpose()
        .map_err(|e| RetryServiceError::validation(format!("invalid query: {e}")))
        .map(Option::unwrap_or_default)
}

pub(crate) fn page_request(per_page: Option<u32>, page: Option<u32>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest {
        per_page: per_page.unwrap_or(defaults.per_page),
        page: page.unwrap_or(defaults.page),
    }
    .clamped()
}

/// Parse an optional query value into a domain enum, naming the field on failure.
pub(crate) fn parse_opt<T>(field: &str, value: Option<&str>) -> Result<Option<T>, RetryServiceError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| RetryServiceError::validation(format!("{field}: {e}")))
        })
        .transpose()
}

/// Parse a path segment label, accepting `retry-schedule` as well as
/// `RETRY_SCHEDULE`.
pub(crate) fn parse_label<T>(field: &str, value: &str) -> Result<T, RetryServiceError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .replace('-', "_")
        .to_ascii_uppercase()
        .parse::<T>()
        .map_err(|e| RetryServiceError::validation(format!("{field}: {e}")))
}

pub(crate) fn parse_timestamp(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RetryServiceError> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RetryServiceError::validation(format!("{field}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    use crate::domain::audit::EntityType;
    use crate::domain::reminder::ReminderChannel;

    #[derive(Deserialize, Default, Debug, PartialEq)]
    #[serde(rename_all = "kebab-case")]
    struct Sample {
        per_page: Option<u32>,
        client_id: Option<uuid::Uuid>,
    }

    #[test]
    fn should_default_missing_query() {
        let query: Sample = parse_query(None).unwrap();
        assert_eq!(query, Sample::default());
    }

    #[test]
    fn should_reject_malformed_query() {
        let result: Result<Sample, _> = parse_query(Some("client-id=nope".into()));
        assert!(matches!(result, Err(RetryServiceError::Validation(_))));
    }

    #[test]
    fn should_clamp_page_request() {
        let page = page_request(Some(500), Some(0));
        assert_eq!(page.per_page, 100);
        assert_eq!(page.page, 1);
        assert_eq!(page_request(None, None).per_page, 25);
    }

    #[test]
    fn should_accept_kebab_and_screaming_labels() {
        let a: EntityType = parse_label("entity type", "retry-schedule").unwrap();
        let b: EntityType = parse_label("entity type", "RETRY_SCHEDULE").unwrap();
        assert_eq!(a, b);
        let channel: ReminderChannel = parse_label("channel", "sms").unwrap();
        assert_eq!(channel, ReminderChannel::Sms);
        assert!(parse_label::<ReminderChannel>("channel", "fax").is_err());
    }

    #[test]
    fn should_parse_optional_enum_and_timestamp() {
        let channel: Option<ReminderChannel> = parse_opt("channel", Some("EMAIL")).unwrap();
        assert_eq!(channel, Some(ReminderChannel::Email));
        assert!(parse_opt::<ReminderChannel>("channel", Some("email")).is_err());
        assert!(parse_timestamp("from", Some("2026-03-02T10:00:00Z")).unwrap().is_some());
        assert!(parse_timestamp("from", Some("yesterday")).is_err());
        assert!(parse_timestamp("from", None).unwrap().is_none());
    }
}
