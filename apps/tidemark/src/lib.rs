//! # Tidemark
//!
//! Command line runner for the Tidemark reduction engine: ingests CSV
//! readings into a redb database and reduces datasets of one configured
//! instrument into flagged measurement values.

pub mod cli;
pub mod config;
pub mod report;
