// core.rs splits chain responsibilities into submodules: block structure,
// in-block state, block-level checks and the chain core itself.
pub mod block;
pub mod chain;
pub mod state;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use state::*;
pub use validation::*;
