// SPDX-License-Identifier: MIT OR Apache-2.0

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use libsf_update_checker::{
    CheckResult, FeedKind, FeedReport, FeedSource, FeedStatus, JsonOutput, ReleaseRecord,
    Verbosity, check_updates_from,
};
use serde::Serialize;

use crate::config::{CliConfig, Overrides};

const FEEDS: [FeedKind; 2] = [FeedKind::BestRelease, FeedKind::Rss];

mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const PARTIAL_FAILURE: i32 = 1;
    pub const FATAL_ERROR: i32 = 2;
}

mod ansi {
    pub const BOLD: &str = "\x1b[1m";
    pub const RESET: &str = "\x1b[0m";

    #[inline]
    pub fn bold(s: &str) -> String {
        if atty::is(atty::Stream::Stdout) {
            format!("{BOLD}{s}{RESET}")
        } else {
            s.to_string()
        }
    }
}

#[derive(Parser)]
#[command(name = "sf-update-checker")]
#[command(about = "check sourceforge projects for newer releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// sourceforge project name
    #[arg(long, global = true)]
    project: Option<String>,

    /// release host to query instead of sourceforge.net
    #[arg(long, global = true)]
    host: Option<String>,

    /// version of the running build
    #[arg(long, global = true, value_name = "VERSION")]
    current_version: Option<String>,

    /// platform of the running build (source, mac, windows, linux)
    #[arg(long, global = true)]
    platform: Option<String>,

    /// build date of the running build (rfc 3339)
    #[arg(long, global = true, value_name = "DATE")]
    build_date: Option<String>,

    /// read best_release.json from a file instead of fetching it
    #[arg(long, global = true, value_name = "PATH")]
    best_file: Option<PathBuf>,

    /// read the rss feed from a file instead of fetching it
    #[arg(long, global = true, value_name = "PATH")]
    rss_file: Option<PathBuf>,

    /// enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// only print counts
    #[arg(short, long, global = true)]
    quiet: bool,

    /// output results as json
    #[arg(long, global = true)]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            project: self.project.clone(),
            host: self.host.clone(),
            current_version: self.current_version.clone(),
            platform: self.platform.clone(),
            build_date: self.build_date.clone(),
        }
    }

    fn source(path: &Option<PathBuf>) -> FeedSource {
        path.clone().map(FeedSource::File).unwrap_or_default()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// show releases newer than the running build
    Check,
    /// show every release found in both feeds
    List,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match CliConfig::load(&cli.overrides()) {
        Ok(c) => c,
        Err(e) => {
            output_error(&cli, &format!("failed to load config: {e}"));
            std::process::exit(exit_codes::FATAL_ERROR);
        }
    };

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        config.verbosity
    };

    let result = match cli.command.as_ref().unwrap_or(&Commands::Check) {
        Commands::Check => cmd_check(&cli, &config, verbosity),
        Commands::List => cmd_list(&cli, &config, verbosity),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output_error(&cli, &e.to_string());
            std::process::exit(exit_codes::FATAL_ERROR);
        }
    }
}

fn output_error(cli: &Cli, msg: &str) {
    if cli.json {
        let output: JsonOutput<()> = JsonOutput::err(msg);
        match serde_json::to_string(&output) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("{} {msg}", ansi::bold("error:")),
        }
    } else {
        eprintln!("{} {msg}", ansi::bold("error:"));
    }
}

fn run_check(cli: &Cli, config: &CliConfig) -> libsf_update_checker::Result<CheckResult> {
    log::debug!(
        target: "cli",
        "checking {} against {} ({}, {})",
        config.project,
        config.current.version,
        config.current.platform,
        config.current.date.to_rfc3339()
    );

    check_updates_from(
        &config.inner,
        &Cli::source(&cli.best_file),
        &Cli::source(&cli.rss_file),
    )
}

/// json payload of `list`.
#[derive(Serialize)]
struct ReleaseListing<'a> {
    best_release: &'a [ReleaseRecord],
    rss: &'a [ReleaseRecord],
}

fn exit_code(result: &CheckResult) -> i32 {
    if result.has_failures() {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    }
}

fn cmd_check(
    cli: &Cli,
    config: &CliConfig,
    verbosity: Verbosity,
) -> Result<i32, libsf_update_checker::Error> {
    let result = run_check(cli, config)?;

    if cli.json {
        let output = JsonOutput::ok(&result);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(exit_code(&result));
    }

    print_feed_issues(&result, verbosity);

    if verbosity == Verbosity::Quiet {
        println!("{}", result.update_count());
        return Ok(exit_code(&result));
    }

    for kind in FEEDS {
        let report = result.report(kind);
        if report.is_failed() {
            continue;
        }

        if report.updates.is_empty() {
            println!("{} {kind}: no updates available", ansi::bold("info:"));
            continue;
        }

        println!(
            "{} {kind}: {} update(s) available:",
            ansi::bold("info:"),
            report.update_count
        );
        println!();
        print_releases_table(&report.updates, verbosity);
        println!();
    }

    Ok(exit_code(&result))
}

fn cmd_list(
    cli: &Cli,
    config: &CliConfig,
    verbosity: Verbosity,
) -> Result<i32, libsf_update_checker::Error> {
    let result = run_check(cli, config)?;

    if cli.json {
        let output = JsonOutput::ok(ReleaseListing {
            best_release: &result.best.releases,
            rss: &result.rss.releases,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(exit_code(&result));
    }

    print_feed_issues(&result, verbosity);

    if verbosity == Verbosity::Quiet {
        let total: usize = FEEDS
            .iter()
            .map(|kind| result.report(*kind).releases.len())
            .sum();
        println!("{total}");
        return Ok(exit_code(&result));
    }

    for kind in FEEDS {
        let report = result.report(kind);
        if report.is_failed() {
            continue;
        }

        if report.releases.is_empty() {
            println!("{} {kind}: no releases found", ansi::bold("info:"));
            continue;
        }

        println!(
            "{} {kind}: {} release(s):",
            ansi::bold("info:"),
            report.releases.len()
        );
        println!();
        print_releases_table(&report.releases, verbosity);
        println!();
    }

    Ok(exit_code(&result))
}

fn print_feed_issues(result: &CheckResult, verbosity: Verbosity) {
    for kind in FEEDS {
        let report: &FeedReport = result.report(kind);

        if let Some(error) = &report.error {
            eprintln!("{} {kind} feed failed: {error}", ansi::bold("warn:"));
            continue;
        }

        if verbosity == Verbosity::Quiet {
            continue;
        }

        match &report.status {
            FeedStatus::Complete => {}
            FeedStatus::Truncated => eprintln!(
                "{} {kind} feed ended early, showing what was received",
                ansi::bold("warn:")
            ),
            FeedStatus::Malformed(msg) => eprintln!(
                "{} {kind} feed is malformed ({msg}), showing what was parsed",
                ansi::bold("warn:")
            ),
        }
    }
}

fn print_releases_table(records: &[ReleaseRecord], verbosity: Verbosity) {
    let name_width = name_width(records, display_name);

    if verbosity == Verbosity::Verbose {
        println!(
            "{:<name_width$}  {:>10}  {:<8}  {:>10}  {:>8}  LINK",
            "NAME", "VERSION", "PLATFORM", "DATE", "SIZE"
        );
        println!("{}", "-".repeat(name_width + 60));

        for r in records {
            let size = if r.size > 0 {
                format_size(r.size)
            } else {
                "-".to_string()
            };
            println!(
                "{:<name_width$}  {:>10}  {:<8}  {:>10}  {:>8}  {}",
                display_name(r),
                version_text(r),
                r.platform,
                date_text(r),
                size,
                r.link
            );
        }
    } else {
        println!(
            "{:<name_width$}  {:>10}  {:<8}  {:>10}",
            "NAME", "VERSION", "PLATFORM", "DATE"
        );
        println!("{}", "-".repeat(name_width + 36));

        for r in records {
            println!(
                "{:<name_width$}  {:>10}  {:<8}  {:>10}",
                display_name(r),
                version_text(r),
                r.platform,
                date_text(r)
            );
        }
    }
}

/// file name part of the release title.
fn display_name(record: &ReleaseRecord) -> &str {
    record
        .title
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(&record.title)
}

fn version_text(record: &ReleaseRecord) -> String {
    record
        .version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

fn date_text(record: &ReleaseRecord) -> String {
    record
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0}K", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

fn name_width<T>(items: &[T], name: impl Fn(&T) -> &str) -> usize {
    items
        .iter()
        .map(|i| name(i).len())
        .max()
        .unwrap_or(10)
        .max(10)
}

#[cfg(test)]
mod tests {
    use libsf_update_checker::{Platform, Version};

    use super::*;

    #[test]
    fn test_display_name() {
        let record = ReleaseRecord::new(Platform::Mac, "/vmpk/0.9.1/vmpk-0.9.1-mac.dmg");
        assert_eq!(display_name(&record), "vmpk-0.9.1-mac.dmg");

        let record = ReleaseRecord::new(Platform::Source, "/vmpk/0.9.1/");
        assert_eq!(display_name(&record), "/vmpk/0.9.1/");
    }

    #[test]
    fn test_missing_fields_render_as_dash() {
        let record = ReleaseRecord::new(Platform::Linux, "notes.txt");
        assert_eq!(version_text(&record), "-");
        assert_eq!(date_text(&record), "-");

        let record = record.with_version(Some(Version::new([1, 0, 2])));
        assert_eq!(version_text(&record), "1.0.2");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2K");
        assert_eq!(format_size(30_010_123), "28.6M");
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "sf-update-checker",
            "list",
            "--project",
            "vmpk",
            "--rss-file",
            "feed.xml",
            "--json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Some(Commands::List)));
        assert!(cli.json);
        assert_eq!(cli.overrides().project.as_deref(), Some("vmpk"));
        assert_eq!(Cli::source(&cli.best_file), FeedSource::Remote);
        assert_eq!(
            Cli::source(&cli.rss_file),
            FeedSource::File(PathBuf::from("feed.xml"))
        );
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["sf-update-checker", "-v", "-q"]).is_err());
    }
}
