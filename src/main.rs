use std::fs::File;
use std::io::{BufReader, Write as _};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use iotimeline::{analyze, render_report};

const REQUIRED_LOGGERS_HELP: &str = "\
Jobs MUST be run in isolation for correct analysis by this tool. Concurrent activity
may result in IOs being incorrectly attributed to the job being analyzed. Do NOT use
this tool to analyze jobs on production clusters.

Analysis requires the following loggers to be enabled:

  com.dremio.exec.work.foreman.AttemptManager   DEBUG
  com.amazonaws.request                         DEBUG
  software.amazon.awssdk.request                DEBUG
  query.logger                                  INFO
  com.dremio.exec.store.dfs.LoggedFileSystem    TRACE";

/// Reconstruct a job's filesystem and object-storage timeline from server logs.
#[derive(Parser)]
#[command(name = "iotimeline", version, after_help = REQUIRED_LOGGERS_HELP)]
struct Cli {
    /// Job ID to reconstruct
    job_id: String,

    /// Root directory of the log folder to scan. There must be a
    /// json/server.json file in this directory.
    log_dir: PathBuf,

    /// Time scale for the visualization: milliseconds of elapsed time per pixel
    #[arg(short = 't', long, default_value_t = 3.0)]
    time_scale: f64,

    /// Output file for the HTML report. If not specified, a temporary file
    /// location will be used.
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Minimum elapsed time in ms; filesystem calls under this threshold are
    /// filtered out of the report
    #[arg(short = 'm', long, default_value_t = 1)]
    min_elapsed: i64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let log_file = cli.log_dir.join("json").join("server.json");
    if !log_file.exists() {
        bail!("could not find logs at {}", log_file.display());
    }

    let reader = BufReader::new(
        File::open(&log_file).with_context(|| format!("failed to open {}", log_file.display()))?,
    );
    let result = analyze(reader, &cli.job_id, cli.min_elapsed)
        .with_context(|| format!("while scanning {}", log_file.display()))?;

    let Some(timeline) = result else {
        // Expected outcome (wrong id, log rotated away, ...), not a failure
        println!(
            "Could not find relevant log messages for job {} in {}",
            cli.job_id,
            log_file.display()
        );
        return Ok(());
    };

    let html = render_report(&timeline, cli.time_scale)?;
    let output_path = match cli.output_file {
        Some(path) => {
            std::fs::write(&path, html)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            path
        }
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("iotimeline-")
                .suffix(".html")
                .tempfile()
                .context("failed to create temporary report file")?;
            let (mut file, path) = tmp.keep().context("failed to keep temporary report file")?;
            file.write_all(html.as_bytes())
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            path
        }
    };

    println!("Output file: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["iotimeline", "1a2b3c", "/var/log/dremio"]).unwrap();
        assert_eq!(cli.job_id, "1a2b3c");
        assert_eq!(cli.time_scale, 3.0);
        assert_eq!(cli.min_elapsed, 1);
        assert!(cli.output_file.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "iotimeline",
            "1a2b3c",
            "/var/log/dremio",
            "-t",
            "0.5",
            "-m",
            "10",
            "-o",
            "report.html",
        ])
        .unwrap();
        assert_eq!(cli.time_scale, 0.5);
        assert_eq!(cli.min_elapsed, 10);
        assert_eq!(cli.output_file, Some(PathBuf::from("report.html")));
    }
}
