//! Port for drawing candidate join codes.

use crate::domain::PoolCode;

/// Source of random join codes. Uniqueness is checked by the registry.
#[cfg_attr(test, mockall::automock)]
pub trait PoolCodeGenerator: Send + Sync {
    /// Draw a fresh candidate code.
    fn generate(&self) -> PoolCode;
}
