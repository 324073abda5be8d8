//! Command-line interface definitions for epaper_harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Paths can be provided via command-line flags or environment variables.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for the e-paper harvester.
///
/// # Examples
///
/// ```sh
/// # Everything in the catalogue, today's editions
/// epaper_harvest
///
/// # Two publications for a past date, overwriting earlier downloads
/// epaper_harvest -p sakal -p dharitri --date 2025-05-30 --force
///
/// # What's configured
/// epaper_harvest -c ./publications.yaml --list
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Publication catalogue (YAML)
    #[arg(short, long, env = "EPAPER_CONFIG", default_value = "publications.yaml")]
    pub config: String,

    /// Root directory for downloaded editions
    #[arg(short, long, env = "EPAPER_OUTPUT_DIR", default_value = "downloads")]
    pub output_dir: String,

    /// Edition date (YYYY-MM-DD); defaults to today's local date
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Only harvest these publications (repeatable)
    #[arg(short, long = "publication", value_name = "NAME")]
    pub publications: Vec<String>,

    /// Publications harvested at once; overrides the catalogue default
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Overwrite files that already exist
    #[arg(long)]
    pub force: bool,

    /// Download only, even when the catalogue enables article digests
    #[arg(long)]
    pub skip_digest: bool,

    /// Print the catalogue and exit
    #[arg(long)]
    pub list: bool,
}
