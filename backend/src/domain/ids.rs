//! UUID-backed identifiers for pool aggregates.
//!
//! Each identifier is a distinct newtype so a `PoolId` can never be passed
//! where a `DisbursementId` is expected. Parsing rejects anything that is not
//! a canonical UUID; adapters decide how to surface that (malformed path
//! parameters are reported as "not found").

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when an identifier string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} must be a valid UUID")]
pub struct InvalidIdError {
    kind: &'static str,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an identifier from its textual form.
            pub fn parse(raw: &str) -> Result<Self, InvalidIdError> {
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| InvalidIdError { kind: $kind })
            }

            /// Access the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(
    /// Identifier of a microfunding pool.
    PoolId,
    "pool id"
);
define_id!(
    /// Identifier of a join request.
    JoinRequestId,
    "join request id"
);
define_id!(
    /// Identifier of a contribution.
    ContributionId,
    "contribution id"
);
define_id!(
    /// Identifier of a disbursement proposal.
    DisbursementId,
    "disbursement id"
);
