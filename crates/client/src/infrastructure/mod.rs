//! Infrastructure - adapters for the outbound ports plus async plumbing

pub mod http;
pub mod mutation_queue;
pub mod platform;
pub mod timeout;

pub use mutation_queue::{MutationAborted, MutationQueue};
pub use timeout::{race, RaceError};
