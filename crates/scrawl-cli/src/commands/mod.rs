//! Command handlers

pub mod config;
pub mod push;
pub mod watch;
