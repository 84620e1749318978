//! Platform adapters: storage backends and id generation.

pub mod desktop;
pub mod memory;
pub mod random;

pub use desktop::FileStorage;
pub use memory::InMemoryStorage;
pub use random::SystemRandom;
