//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL repositories on Diesel with `diesel-async`
//! - **memory**: in-process store implementing every repository port, used
//!   for development without a database and by integration tests
//! - **payment**: Snap checkout gateway over `reqwest`, plus a disabled
//!   stand-in when no server key is configured
//! - **security**: password hashing and join-code generation
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod memory;
pub mod payment;
pub mod persistence;
pub mod security;
