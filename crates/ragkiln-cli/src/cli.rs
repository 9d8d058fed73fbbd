//! Argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ragkiln")]
#[command(about = "Crawl, extract, and merge documents into the ragkiln store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to built-in defaults + env overrides)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the logging filter (e.g. "debug", "ragkiln_pipeline=debug")
    #[arg(long, global = true)]
    pub log_filter: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline over a fixed set of pages and print the report
    Ingest {
        /// JSON file of `[{"url": ..., "markdown": ...}, ...]` pages to crawl.
        ///
        /// The real HTML/Markdown fetcher is outside this repository's
        /// scope; this file is the operator-facing stand-in that feeds the
        /// same `Crawler` contract the orchestrator expects.
        #[arg(short = 'p', long, value_name = "PAGES_JSON")]
        pages: PathBuf,

        /// Starting URL recorded in the run (defaults to config's crawl.start_url)
        #[arg(long)]
        start_url: Option<String>,

        /// Cap on pages processed (defaults to config's crawl.max_pages)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Output format for the run report
        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: ReportFormat,

        /// Disable the progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the effective configuration (file + env overrides applied)
    Config {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "toml")]
        format: ConfigFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_requires_pages_path() {
        let result = Cli::try_parse_from(["ragkiln", "ingest"]);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_parses_with_defaults() {
        let cli = Cli::try_parse_from(["ragkiln", "ingest", "--pages", "pages.json"]).unwrap();
        match cli.command {
            Commands::Ingest { pages, format, no_progress, .. } => {
                assert_eq!(pages, PathBuf::from("pages.json"));
                assert_eq!(format, ReportFormat::Table);
                assert!(!no_progress);
            }
            _ => panic!("expected Ingest command"),
        }
    }

    #[test]
    fn ingest_parses_json_format_and_overrides() {
        let cli = Cli::try_parse_from([
            "ragkiln",
            "ingest",
            "-p",
            "pages.json",
            "--start-url",
            "https://docs.example.com",
            "--max-pages",
            "5",
            "-f",
            "json",
            "--no-progress",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest {
                start_url,
                max_pages,
                format,
                no_progress,
                ..
            } => {
                assert_eq!(start_url.as_deref(), Some("https://docs.example.com"));
                assert_eq!(max_pages, Some(5));
                assert_eq!(format, ReportFormat::Json);
                assert!(no_progress);
            }
            _ => panic!("expected Ingest command"),
        }
    }

    #[test]
    fn config_defaults_to_toml() {
        let cli = Cli::try_parse_from(["ragkiln", "config"]).unwrap();
        match cli.command {
            Commands::Config { format } => assert_eq!(format, ConfigFormat::Toml),
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn global_config_flag_is_accepted_before_or_after_the_subcommand() {
        let cli = Cli::try_parse_from(["ragkiln", "-c", "ragkiln.toml", "config"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ragkiln.toml")));

        let cli = Cli::try_parse_from(["ragkiln", "ingest", "-p", "p.json", "-c", "ragkiln.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ragkiln.toml")));
    }
}
