//! The persistent runtime core, one module per concern:
//!
//! - [`state`]: scope chain, function registry, call stack
//! - [`events`]: FIFO event queue, handler registry, delayed scheduler
//! - [`governor`]: resource ceilings and the guards that enforce them
//! - [`integrity`]: snapshots, rollback, transactional execution
//! - [`time_engine`]: bounded step history, checkpoints, cursor navigation
//! - [`recorder`]: lightweight activity log with listeners
//! - [`errors`]: the [`AuraError`] model and fault classification
//! - [`engine`]: [`AuraRuntime`], which owns all of the above
//! - [`inspector`]: formatted dumps over a live runtime

pub mod engine;
pub mod errors;
pub mod events;
pub mod governor;
pub mod inspector;
pub mod integrity;
pub mod recorder;
pub mod state;
pub mod time_engine;

pub use engine::AuraRuntime;
pub use errors::AuraError;
