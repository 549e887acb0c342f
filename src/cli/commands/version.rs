//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    build: &'static str,
    /// Schema version of databases this build creates.
    schema: i32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        name: "dcd",
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        schema: crate::storage::schema::CURRENT_SCHEMA_VERSION,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} version {} ({}, schema {})",
            output.name, output.version, output.build, output.schema
        );
    }
    Ok(())
}
