//! Subcommand implementations.

pub mod clear;
pub mod config;
pub mod delete;
pub mod index;
pub mod open;
pub mod search;
pub mod status;
