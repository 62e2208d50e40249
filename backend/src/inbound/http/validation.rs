//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every helper yields an `invalid_request` error whose `details` name the
//! offending field, so clients can highlight it without parsing messages.

use std::fmt::Display;

use serde_json::json;

use crate::domain::{Error, UserId};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidValue,
    UnknownVariant,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::UnknownVariant => "unknown_variant",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

fn field_error(field: &str, code: ErrorCode, message: String) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field,
        "code": code.as_str(),
    }))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let field = field.as_str();
    field_error(
        field,
        ErrorCode::MissingField,
        format!("missing required field: {field}"),
    )
}

/// Wrap a domain validation failure reported against `field`.
pub(crate) fn invalid_value_error(field: &str, error: impl Display) -> Error {
    field_error(field, ErrorCode::InvalidValue, error.to_string())
}

pub(crate) fn unknown_variant_error(field: FieldName, value: &str, expected: &str) -> Error {
    let field = field.as_str();
    Error::invalid_request(format!("{field} must be one of {expected}")).with_details(json!({
        "field": field,
        "value": value,
        "code": ErrorCode::UnknownVariant.as_str(),
    }))
}

/// Require an optional body field.
pub(crate) fn require<T>(value: Option<T>, field: FieldName) -> Result<T, Error> {
    value.ok_or_else(|| missing_field_error(field))
}

/// Parse a user id carried in a request body.
pub(crate) fn parse_user_id(value: &str, field: FieldName) -> Result<UserId, Error> {
    let name = field.as_str();
    UserId::new(value).map_err(|_| {
        Error::invalid_request(format!("{name} must be a valid UUID")).with_details(json!({
            "field": name,
            "value": value,
            "code": ErrorCode::InvalidUuid.as_str(),
        }))
    })
}

/// Parse an identifier taken from the URL path.
///
/// A malformed identifier cannot name an existing resource, so it is
/// reported as `not_found` rather than as a validation failure.
pub(crate) fn parse_path_id<T, E>(
    raw: &str,
    resource: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, Error> {
    parse(raw).map_err(|_| Error::not_found(format!("{resource} {raw} not found")))
}

/// Parse an enumerated label case-insensitively, reporting the accepted
/// spellings on failure.
pub(crate) fn parse_label<T>(
    value: &str,
    field: FieldName,
    expected: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, Error> {
    parse(&value.trim().to_ascii_uppercase())
        .ok_or_else(|| unknown_variant_error(field, value, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode as DomainCode, PoolId, PoolStatus};
    use rstest::rstest;

    #[rstest]
    fn missing_fields_name_the_field() {
        let err = require::<String>(None, FieldName::new("title")).expect_err("missing");
        assert_eq!(err.code(), DomainCode::InvalidRequest);
        assert_eq!(
            err.details(),
            Some(&json!({"field": "title", "code": "missing_field"}))
        );
    }

    #[rstest]
    fn malformed_path_ids_are_not_found() {
        let err = parse_path_id("pool-1", "pool", PoolId::parse).expect_err("malformed");
        assert_eq!(err.code(), DomainCode::NotFound);
        assert_eq!(err.message(), "pool pool-1 not found");
    }

    #[rstest]
    fn body_user_ids_must_be_uuids() {
        let err = parse_user_id("someone", FieldName::new("recipientUserId")).expect_err("bad");
        assert_eq!(err.code(), DomainCode::InvalidRequest);
        assert_eq!(err.details().and_then(|d| d.get("code")), Some(&json!("invalid_uuid")));
    }

    #[rstest]
    #[case("open", Some(PoolStatus::Open))]
    #[case("CLOSED", Some(PoolStatus::Closed))]
    #[case("archived", None)]
    fn labels_parse_or_report_choices(#[case] raw: &str, #[case] expected: Option<PoolStatus>) {
        let result = parse_label(raw, FieldName::new("status"), "OPEN|CLOSED", PoolStatus::from_label);
        match expected {
            Some(status) => assert_eq!(result.expect("known label"), status),
            None => {
                let err = result.expect_err("unknown label");
                assert_eq!(err.message(), "status must be one of OPEN|CLOSED");
            }
        }
    }
}
