//! Port traits at the boundary of the client layer.

pub mod outbound;
