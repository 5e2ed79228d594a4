//! The per-unit stage chain: construction, resolution and per-record execution.

mod builder;
mod chain;
mod collector;
mod resolver;
mod stage;
#[cfg(test)]
mod stage_test;
mod trap;

pub use builder::build_chain;
pub use chain::{Chain, ChainIter};
pub use stage::Stage;
pub use trap::Trap;
