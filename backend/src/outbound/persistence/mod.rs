//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repositories implement the domain's driven ports over `diesel-async`
//! connections pooled with `bb8`. Row structs (`models.rs`) and table
//! definitions (`schema.rs`) stay private to this module; every database
//! error is mapped into the owning port's error enum.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), healthfund::outbound::persistence::PoolError> {
//! use healthfund::outbound::persistence::{DbPool, DieselPoolRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/healthfund")).await?;
//! let pools = DieselPoolRepository::new(pool);
//! # Ok(())
//! # }
//! ```

mod diesel_contribution_repository;
mod diesel_disbursement_repository;
mod diesel_membership_repository;
mod diesel_pool_repository;
mod diesel_user_repository;
mod error_mapping;
mod models;
mod pool;
mod schema;

pub use diesel_contribution_repository::DieselContributionRepository;
pub use diesel_disbursement_repository::DieselDisbursementRepository;
pub use diesel_membership_repository::DieselMembershipRepository;
pub use diesel_pool_repository::DieselPoolRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
