//! HTTP inbound adapter exposing the REST API under `/api/v1`.
//!
//! Handlers translate JSON bodies into validated domain inputs, call the
//! driving ports held in [`state::HttpState`] and wrap results in the
//! success envelope from [`envelope`]. Failures render through
//! [`error`].

pub mod contributions;
pub mod disbursements;
pub mod envelope;
pub mod error;
pub mod health;
pub mod join_requests;
pub mod pools;
pub mod schemas;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod users;
pub mod validation;

pub use crate::domain::ApiResult;
