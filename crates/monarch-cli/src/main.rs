//! # monarch CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use monarch_cli::check::{run_check, CheckArgs};
use monarch_cli::decode::{run_decode, run_query, DecodeArgs, QueryArgs};
use monarch_cli::inspect::{
    run_pipeline, run_projection, run_validator, PipelineArgs, ProjectionCommandArgs,
    ValidatorArgs,
};

/// Monarch: schemas, projections and relation population for a document
/// store.
#[derive(Parser, Debug)]
#[command(name = "monarch", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Without it, RUST_LOG is honored.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load schema definitions and check every relation resolves.
    Check(CheckArgs),

    /// Print the find or aggregation a read would send to the store.
    Pipeline(PipelineArgs),

    /// Print the projection composed for a request.
    Projection(ProjectionCommandArgs),

    /// Print the $jsonSchema validator, or check documents against it.
    Validator(ValidatorArgs),

    /// Decode raw stored documents.
    Decode(DecodeArgs),

    /// Run a read against a JSON fixture held in memory.
    Query(QueryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check(args) => run_check(&args),
        Commands::Pipeline(args) => run_pipeline(&args),
        Commands::Projection(args) => run_projection(&args),
        Commands::Validator(args) => run_validator(&args),
        Commands::Decode(args) => run_decode(&args),
        Commands::Query(args) => run_query(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_check() {
        let cli = Cli::try_parse_from(["monarch", "check", "--schemas", "s.yaml"]).unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.schemas, PathBuf::from("s.yaml"));
    }

    #[test]
    fn cli_parse_pipeline_repeated_flags() {
        let cli = Cli::try_parse_from([
            "monarch",
            "pipeline",
            "--schemas",
            "s.yaml",
            "--collection",
            "posts",
            "--populate",
            "author",
            "--populate",
            "editor",
            "--select",
            "title",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Pipeline(args) = cli.command else {
            panic!("expected pipeline");
        };
        assert_eq!(args.target.collection, "posts");
        assert_eq!(args.populate, vec!["author", "editor"]);
        assert_eq!(args.projection.select, vec!["title"]);
    }

    #[test]
    fn cli_rejects_select_with_omit() {
        let result = Cli::try_parse_from([
            "monarch",
            "projection",
            "--schemas",
            "s.yaml",
            "--collection",
            "users",
            "--select",
            "name",
            "--omit",
            "age",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_query_requires_data() {
        let result = Cli::try_parse_from([
            "monarch",
            "query",
            "--schemas",
            "s.yaml",
            "--collection",
            "posts",
        ]);
        assert!(result.is_err());
    }
}
