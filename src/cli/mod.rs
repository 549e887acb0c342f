//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Deploy content between sites as a folder of JSON files
#[derive(Parser, Debug)]
#[command(name = "dcd", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.dcd/data/content.db)
    #[arg(long, global = true, env = "DCD_DB")]
    pub db: Option<PathBuf>,

    /// Content folder (default: ~/.dcd/content)
    #[arg(long, global = true, env = "DCD_CONTENT_DIR")]
    pub content_dir: Option<PathBuf>,

    /// Directory holding file binaries; file records are skipped without one
    #[arg(long, global = true, env = "DCD_FILES_DIR")]
    pub files_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Preview changes without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the target database and content folder
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Import the content folder into the database
    Import {
        /// Replace records holding the same id under another uuid
        #[arg(long)]
        force_update: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Import URL aliases only
    ImportAliases,

    /// Export records of one entity type
    Export(ExportArgs),

    /// Export records of one entity type and everything they reference
    ExportWithReferences(ExportArgs),

    /// Export all content
    ExportSite {
        /// Further entity types to export (comma-separated)
        #[arg(long, value_delimiter = ',')]
        add_entity_type: Vec<String>,

        /// Entity types to leave out (comma-separated)
        #[arg(long, value_delimiter = ',')]
        skip_entity_type: Vec<String>,
    },

    /// Export URL aliases only
    ExportAliases,

    /// List the content entity types
    EntityList,

    /// Show the anonymous and admin uuids and the admin's name
    UuidInfo,

    /// Set the anonymous and admin uuids and the admin's name
    UuidSync {
        /// New uuid for the anonymous user (id 0)
        #[arg(long, value_name = "UUID")]
        anonymous: Option<String>,

        /// New uuid for the admin (id 1)
        #[arg(long, value_name = "UUID")]
        admin: Option<String>,

        /// New name for the admin
        #[arg(long)]
        name: Option<String>,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Entity type to export
    pub entity_type: String,

    /// Bundles to export (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub bundle: Vec<String>,

    /// Entity ids to export (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub entity_id: Vec<i64>,

    /// Entity ids to leave out (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip_entities: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_lists_split_on_commas() {
        let cli = Cli::parse_from([
            "dcd",
            "export",
            "node",
            "--bundle",
            "article,page",
            "--entity-id",
            "1,2,3",
            "--skip-entities",
            "2",
        ]);
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.entity_type, "node");
        assert_eq!(args.bundle, vec!["article", "page"]);
        assert_eq!(args.entity_id, vec![1, 2, 3]);
        assert_eq!(args.skip_entities, vec![2]);
    }

    #[test]
    fn test_uuid_sync_values_are_optional() {
        let cli = Cli::parse_from(["dcd", "uuid-sync", "--admin", "a-1", "--name", "root"]);
        let Commands::UuidSync {
            anonymous,
            admin,
            name,
        } = cli.command
        else {
            panic!("expected uuid-sync");
        };
        assert_eq!(anonymous, None);
        assert_eq!(admin.as_deref(), Some("a-1"));
        assert_eq!(name.as_deref(), Some("root"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dcd", "import", "--force-update", "--dry-run", "--db", "x.db"]);
        assert!(cli.dry_run);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(
            cli.command,
            Commands::Import {
                force_update: true,
                yes: false
            }
        ));
    }
}
