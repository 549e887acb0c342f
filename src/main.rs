//! Content deploy CLI entry point.

use clap::Parser;
use colored::Colorize;
use dcd::cli::commands;
use dcd::cli::{Cli, Commands};
use dcd::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // JSON when asked for, or when stdout is piped
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("{} {e}\n  Hint: {hint}", "Error:".red().bold());
                } else {
                    eprintln!("{} {e}", "Error:".red().bold());
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Init { force } => commands::init::execute(cli, *force, json),
        Commands::Version => commands::version::execute(json),

        Commands::Import { force_update, yes } => {
            commands::import::execute(cli, *force_update, *yes, json)
        }
        Commands::ImportAliases => commands::aliases::execute_import(cli, json),

        Commands::Export(args) => commands::export::execute(cli, args, false, json),
        Commands::ExportWithReferences(args) => commands::export::execute(cli, args, true, json),
        Commands::ExportSite {
            add_entity_type,
            skip_entity_type,
        } => commands::export::execute_site(cli, add_entity_type, skip_entity_type, json),
        Commands::ExportAliases => commands::aliases::execute_export(cli, json),

        Commands::EntityList => commands::entity_list::execute(json),
        Commands::UuidInfo => commands::identity::execute_info(cli, json),
        Commands::UuidSync {
            anonymous,
            admin,
            name,
        } => commands::identity::execute_sync(
            cli,
            anonymous.as_deref(),
            admin.as_deref(),
            name.as_deref(),
            json,
        ),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
