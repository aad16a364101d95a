//! CLI entry point for `mboxsplit`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxsplit::config::{Config, ProgressMode, WriteMode};
use mboxsplit::split::{self, SplitOptions, SplitSummary};

/// Split an MBOX file into one mailbox per month (split/mail-YYMM).
///
/// Messages whose Date header is missing or unparseable go to
/// split/mail-broken. Message bytes are copied unchanged.
#[derive(Parser)]
#[command(name = "mboxsplit", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// MBOX file to split
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output directory (default: split)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Progress style
    #[arg(long, value_enum, value_name = "STYLE")]
    progress: Option<ProgressMode>,

    /// Keep output files open for the whole run instead of reopening per message
    #[arg(long)]
    keep_open: bool,

    /// Print a per-destination summary when done
    #[arg(long)]
    stats: bool,

    /// Print the summary as JSON (implies --progress none unless given)
    #[arg(long)]
    json: bool,

    /// Configuration file
    #[arg(long, value_name = "FILE", env = "MBOXSPLIT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => mboxsplit::config::load_config_from(path),
        None => mboxsplit::config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match &cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(*shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match cli.file.as_deref() {
            Some(path) => cmd_split(path, &cli, &config),
            None => anyhow::bail!("No MBOX file given. Usage: mboxsplit <FILE>"),
        },
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mboxsplit::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxsplit.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxsplit", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    io::stdout().write_all(&buf)?;
    Ok(())
}

/// Split an MBOX file and optionally print a summary.
fn cmd_split(path: &Path, cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let mut options = SplitOptions::from(config);
    if let Some(ref dir) = cli.output {
        options.output_dir = dir.clone();
    }
    if cli.keep_open {
        options.write_mode = WriteMode::Held;
    }

    let progress = match cli.progress {
        Some(mode) => mode,
        None if cli.json => ProgressMode::Silent,
        None => config.display.progress,
    };

    let start = Instant::now();

    let summary = match progress {
        ProgressMode::Lines => {
            let mut counter = MailCounter::new(io::stdout().lock());
            let result = split::split_mbox(
                path,
                &options,
                &mut |count, _key| counter.report(count),
                None,
            );
            let summary = result?;
            counter.finish().context("Failed to write to stdout")?;
            summary
        }
        ProgressMode::Bar => {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} Splitting [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )
                    .expect("valid template")
                    .progress_chars("#>-"),
            );
            let result = split::split_mbox(
                path,
                &options,
                &mut |_, _| {},
                Some(&|current, total| {
                    pb.set_length(total);
                    pb.set_position(current);
                }),
            );
            pb.finish_and_clear();
            result?
        }
        ProgressMode::Silent => split::split_mbox(path, &options, &mut |_, _| {}, None)?,
    };

    let elapsed = start.elapsed();

    if cli.json {
        print_summary_json(path, &options.output_dir, &summary, elapsed)?;
    } else if cli.stats {
        print_summary_table(path, &options.output_dir, &summary, elapsed);
    }

    Ok(())
}

/// Writes the `"<n> mails"` running count.
///
/// A closed stdout (broken pipe) silences the count without stopping the
/// split. Any other write error is kept and returned by [`MailCounter::finish`].
struct MailCounter<W: Write> {
    out: W,
    closed: bool,
    error: Option<io::Error>,
}

impl<W: Write> MailCounter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            closed: false,
            error: None,
        }
    }

    fn report(&mut self, count: u64) {
        if self.closed || self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{count} mails") {
            self.fail(e);
        }
    }

    fn fail(&mut self, e: io::Error) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            tracing::debug!("stdout closed; no longer printing the running count");
            self.closed = true;
        } else {
            self.error = Some(e);
        }
    }

    fn finish(mut self) -> io::Result<()> {
        if !self.closed && self.error.is_none() {
            if let Err(e) = self.out.flush() {
                self.fail(e);
            }
        }
        self.error.map_or(Ok(()), Err)
    }
}

/// Print the run summary in a human-readable table.
fn print_summary_table(
    path: &Path,
    output_dir: &Path,
    summary: &SplitSummary,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Input", path.display());
    println!("  {:<20} {}", "Output directory", output_dir.display());
    println!("  {:<20} {}", "Messages", summary.messages);
    println!("  {:<20} {}", "Broken dates", summary.broken());
    println!(
        "  {:<20} {}",
        "Bytes written",
        format_size(summary.bytes, BINARY)
    );
    println!("  {:<20} {:.2?}", "Time", elapsed);

    if !summary.destinations.is_empty() {
        println!();
        println!("  {:<14} {:>8} {:>12}", "File", "Messages", "Size");
        println!("  {}", "-".repeat(36));
        for (key, stats) in &summary.destinations {
            println!(
                "  {:<14} {:>8} {:>12}",
                key.file_name(),
                stats.messages,
                format_size(stats.bytes, BINARY)
            );
        }
    }
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(
    path: &Path,
    output_dir: &Path,
    summary: &SplitSummary,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let files: Vec<serde_json::Value> = summary
        .destinations
        .iter()
        .map(|(key, stats)| {
            serde_json::json!({
                "file": key.file_name(),
                "path": output_dir.join(key.file_name()).to_string_lossy(),
                "messages": stats.messages,
                "bytes": stats.bytes,
            })
        })
        .collect();

    let output = serde_json::json!({
        "input": path.to_string_lossy(),
        "output_dir": output_dir.to_string_lossy(),
        "message_count": summary.messages,
        "broken_count": summary.broken(),
        "bytes_written": summary.bytes,
        "elapsed_ms": elapsed.as_millis(),
        "files": files,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
