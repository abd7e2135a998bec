mod export_config;
mod exporter;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use crate::export_config::{ExportConfig, OverwritePolicy, Variant};
use crate::exporter::{ExportReport, export_artifact};

#[derive(Debug, Parser)]
#[command(
    name = "ino-export",
    about = "Copy the firmware source into a sketch folder as an .ino file"
)]
struct Cli {
    /// Directory containing the source tree. Defaults to the current directory.
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Built-in destination layout
    #[arg(long, value_enum, default_value_t = Variant::Ino)]
    variant: Variant,

    /// JSON export config; replaces the variant defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Destination directory name (single level, under the working directory)
    #[arg(long)]
    dest_dir: Option<String>,

    /// Artifact name; `.ino` is appended when missing
    #[arg(long)]
    output_name: Option<String>,

    /// Source file, relative to the working directory
    #[arg(long)]
    source: Option<PathBuf>,

    /// Fail instead of replacing an existing artifact
    #[arg(long)]
    no_clobber: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn export_config(&self) -> anyhow::Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::load(path)?,
            None => ExportConfig::for_variant(self.variant),
        };

        if let Some(dest_dir) = &self.dest_dir {
            config.destination_dir_name = dest_dir.clone();
        }
        if let Some(output_name) = &self.output_name {
            config.output_file_name = output_name.clone();
        }
        if let Some(source) = &self.source {
            config.source_relative_path = source.clone();
        }
        if self.no_clobber {
            config.overwrite = OverwritePolicy::Fail;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Runs one export and writes the console report to `out`.
///
/// In plain mode the working directory line goes out before the filesystem is
/// touched, so it is shown even when the export fails.
fn run(
    working_dir: &Path,
    config: &ExportConfig,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<ExportReport> {
    if !json {
        writeln!(out, "{}", working_dir.display())?;
    }

    let report = export_artifact(working_dir, config)
        .with_context(|| format!("Export into {} failed", config.destination_dir_name))?;
    log::info!("Artifact ready at {}", report.artifact.display());

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize export report")?;
        writeln!(out, "{rendered}")?;
    } else {
        writeln!(out, "{}", report.listing_line())?;
    }
    Ok(report)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();
    let config = args.export_config()?;

    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    log::debug!("Exporting from {} with {config:?}", working_dir.display());

    run(&working_dir, &config, args.json, &mut std::io::stdout().lock())?;
    Ok(())
}
