//! Core domain logic: indicator math, strategy validation, rule compilation,
//! and the bar-by-bar simulation engine.

pub mod backtest;
pub mod bar;
pub mod compile;
pub mod error;
pub mod indicator;
pub mod position;
pub mod risk;
pub mod rule;
pub mod strategy;
pub mod summary;
pub mod validate;
