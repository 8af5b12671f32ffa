pub mod commands;
pub mod config;
pub mod error;
pub mod observability;
pub mod segments;
