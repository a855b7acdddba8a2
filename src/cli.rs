// File: ./src/cli.rs
//! Command-line parsing and help for the `eventfold` binary.
use anyhow::{Result, anyhow, bail};
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub root: Option<PathBuf>,
    pub horizon_days: Option<u32>,
    pub health: bool,
    pub cached: bool,
    pub verbose: bool,
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments, excluding the binary name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" | "help" => parsed.help = true,
                "-v" | "--verbose" => parsed.verbose = true,
                "--health" => parsed.health = true,
                "--cached" => parsed.cached = true,
                "-r" | "--root" => {
                    let value = args.next().ok_or_else(|| anyhow!("{} needs a path", arg))?;
                    parsed.root = Some(PathBuf::from(value));
                }
                "--horizon" => {
                    let value = args.next().ok_or_else(|| anyhow!("--horizon needs a number of days"))?;
                    let days = value
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid horizon '{}': expected days", value))?;
                    parsed.horizon_days = Some(days);
                }
                other => bail!("Unknown argument '{}' (see --help)", other),
            }
        }
        Ok(parsed)
    }
}

pub fn print_help(binary_name: &str) {
    println!(
        "eventfold v{} - Collects local event listings into one deduplicated list",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] [--horizon <days>] [--health] [--cached] [-v]", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and cache.");
    println!("    --horizon <days>      Override how many days ahead to keep (config: horizon_days).");
    println!("    --health              Print per-source health instead of the event list.");
    println!("    --cached              Print the last saved run without fetching anything.");
    println!("    -v, --verbose         Debug logging on stderr.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("FILES:");
    println!("    <config dir>/config.toml     Pipeline settings (all keys optional)");
    println!("    <config dir>/sources.toml    [[sources]] list: name, kind, endpoint, parser, group");
    println!("    <cache dir>/last_run.json    Snapshot of the last run");
    println!();
    println!("OUTPUT:");
    println!("    JSON on stdout; logs go to stderr.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse(["--root", "/tmp/ef", "--horizon", "7", "--health", "-v"]).unwrap();
        assert_eq!(args.root, Some(PathBuf::from("/tmp/ef")));
        assert_eq!(args.horizon_days, Some(7));
        assert!(args.health && args.verbose);
        assert!(!args.cached && !args.help);
    }

    #[test]
    fn test_parse_errors() {
        assert!(CliArgs::parse(["--root"]).is_err());
        assert!(CliArgs::parse(["--horizon", "soon"]).is_err());
        assert!(CliArgs::parse(["--frobnicate"]).is_err());
        assert_eq!(CliArgs::parse(Vec::<String>::new()).unwrap(), CliArgs::default());
    }
}
