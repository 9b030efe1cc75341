// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Usage:
//   bb-vault 25spring 24fall
//   bb-vault --config me.toml --output ~/courses --jobs 4 25spring
//   bb-vault --list
// =============================================================================

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::DEFAULT_TIMEOUT_SECS;

#[derive(Parser, Debug)]
#[command(
    name = "bb-vault",
    version = "0.1.0",
    about = "Mirror Blackboard course content to a local folder",
    long_about = "bb-vault logs into Blackboard through CAS, walks the courses of the \
                  terms you ask for and saves every entry's text and attached files \
                  under <term>/<course>/<category>/<page>/<entry>."
)]
pub struct Cli {
    /// Term codes to mirror, e.g. 25spring 24fall
    ///
    /// A code is the last two digits of the year followed by the season.
    /// Terms that aren't in your course list are skipped with a warning.
    #[arg(required_unless_present = "list")]
    pub terms: Vec<String>,

    /// TOML file with `username` and `password` (and optionally a [portal] table)
    #[arg(long, default_value = "login.toml")]
    pub config: PathBuf,

    /// Mirror root. WARNING: it is deleted and rebuilt on every run
    #[arg(long, default_value = "./bb-vault")]
    pub output: PathBuf,

    /// How many courses to crawl at the same time
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Timeout in seconds for every network request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Print the crawl report (or course list) as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Only print your terms, courses and latest announcements; don't crawl
    #[arg(long)]
    pub list: bool,

    /// More logging (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is `terms` a Vec?
//    - Positional arguments collected into a Vec accept any number of values
//    - `required_unless_present = "list"` makes at least one term mandatory
//      unless --list was given
//
// 2. What does ArgAction::Count do?
//    - Each `-v` adds one, so `-vv` gives 2
//    - The field type must be an integer (u8 here)
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bb-vault", "25spring", "24fall"]).unwrap();
        assert_eq!(cli.terms, vec!["25spring", "24fall"]);
        assert_eq!(cli.config, PathBuf::from("login.toml"));
        assert_eq!(cli.output, PathBuf::from("./bb-vault"));
        assert_eq!(cli.jobs, 1);
        assert_eq!(cli.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.json && !cli.list);
    }

    #[test]
    fn test_terms_required_unless_listing() {
        assert!(Cli::try_parse_from(["bb-vault"]).is_err());

        let cli = Cli::try_parse_from(["bb-vault", "--list", "-vv"]).unwrap();
        assert!(cli.list);
        assert!(cli.terms.is_empty());
        assert_eq!(cli.verbose, 2);
    }
}
