//! List the content entity types.

use colored::Colorize;
use serde::Serialize;

use crate::config::load_config;
use crate::error::Result;
use crate::model::{TypeDescriptor, TypeRegistry, TypeRole};

#[derive(Serialize)]
struct TypeRow<'a> {
    id: &'a str,
    role: TypeRole,
    owner: bool,
    revisions: bool,
    changed_time: bool,
}

impl<'a> From<&'a TypeDescriptor> for TypeRow<'a> {
    fn from(t: &'a TypeDescriptor) -> Self {
        Self {
            id: &t.id,
            role: t.role,
            owner: t.supports_owner,
            revisions: t.supports_revisions,
            changed_time: t.supports_changed_time,
        }
    }
}

/// Execute the entity-list command.
///
/// # Errors
///
/// Returns an error if the config file is invalid.
pub fn execute(json: bool) -> Result<()> {
    let registry = load_config()?.registry();
    print_types(&registry, json)
}

fn print_types(registry: &TypeRegistry, json: bool) -> Result<()> {
    let rows: Vec<TypeRow<'_>> = registry
        .content_types()
        .into_iter()
        .map(TypeRow::from)
        .collect();

    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    println!("{}", "Content entity types".bold());
    for row in &rows {
        let mut flags = Vec::new();
        if row.owner {
            flags.push("owner");
        }
        if row.revisions {
            flags.push("revisions");
        }
        if !row.changed_time {
            flags.push("no changed time");
        }
        if flags.is_empty() {
            println!("  {}", row.id);
        } else {
            println!("  {:<20} {}", row.id, flags.join(", ").dimmed());
        }
    }
    Ok(())
}
