//! Shared counter store: the only owner of throttling state.

mod backend;
mod keys;
mod memory;
mod timeout;

pub use backend::{CounterStore, StoreResult};
pub use keys::StoreKey;
pub use memory::MemoryStore;
pub use timeout::TimeoutStore;

#[cfg(test)]
pub(crate) mod testing;
