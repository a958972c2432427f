//! Port traits: the seams between the domain and the outside world.

pub mod data_port;
pub mod store_port;
