pub mod config;
pub mod decorate;
pub mod error;
pub mod file;
pub mod files;
pub mod logging;
pub mod report;
pub mod scheduler;
pub mod transform;
