//! Random join-code generation.

use rand::Rng;

use crate::domain::ports::PoolCodeGenerator;
use crate::domain::{POOL_CODE_ALPHABET, POOL_CODE_LEN, PoolCode};

/// Draws codes uniformly from the join-code alphabet using the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPoolCodeGenerator;

impl PoolCodeGenerator for RandomPoolCodeGenerator {
    fn generate(&self) -> PoolCode {
        let mut rng = rand::thread_rng();
        let indices: [usize; POOL_CODE_LEN] =
            std::array::from_fn(|_| rng.gen_range(0..POOL_CODE_ALPHABET.len()));
        PoolCode::from_indices(indices)
    }
}
