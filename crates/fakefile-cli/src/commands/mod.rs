//! Client subcommand implementations.

pub mod demo;
pub mod stress;

use anyhow::Result;
use serde::Serialize;

/// Print `report` as pretty JSON.
pub fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
