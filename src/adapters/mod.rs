//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod json_store;
