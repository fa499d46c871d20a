pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod journal;
pub mod sync;
