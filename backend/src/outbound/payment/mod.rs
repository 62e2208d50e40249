//! Payment gateway adapters.
//!
//! - [`SnapPaymentGateway`] talks to a Snap-style hosted checkout API over
//!   HTTPS and verifies settlement notifications by signature.
//! - [`DisabledPaymentGateway`] stands in when no server key is configured so
//!   the rest of the service still starts.

mod disabled;
mod dto;
mod snap;

pub use disabled::DisabledPaymentGateway;
pub use snap::{SnapGatewayConfig, SnapPaymentGateway};
