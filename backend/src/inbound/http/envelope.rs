//! Success envelope shared by every JSON endpoint.
//!
//! Successful responses are wrapped as `{success: true, message?, data}`;
//! failures use the matching error envelope built in [`super::error`].

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

/// Success response wrapper.
#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T> {
    /// Always `true` for successful responses.
    pub success: bool,
    /// Optional human-readable summary of what happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation result.
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap `data` without a message.
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Render as `200 OK`.
    pub fn ok(self) -> HttpResponse {
        self.respond(StatusCode::OK)
    }

    /// Render as `201 Created`.
    pub fn created(self) -> HttpResponse {
        self.respond(StatusCode::CREATED)
    }

    fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}
