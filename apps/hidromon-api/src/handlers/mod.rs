//! Handlers 模块

pub mod alerts;
pub mod commands;
pub mod devices;
pub mod metrics;

pub use alerts::*;
pub use commands::*;
pub use devices::*;
pub use metrics::*;
