//! Format aliasing verification binary
//!
//! Uploads the 256-texel byte ramp once, decodes it on the GPU through every
//! view of a manifest and compares each value with its analytic expectation.
//!
//! Exit status is 0 when every texel matches, 1 when any texel is out of
//! tolerance and 2 when the run could not complete.
//!
//! # Usage
//! ```bash
//! verify_views --aliasing --json report.json -v
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use texel_alias::{Harness, HarnessError, ManifestError, RunManifest, ValidationReport};
use texel_alias_verification::table::DEFAULT_COLUMNS;
use texel_alias_verification::{BootstrapError, ReportTable, WgpuDevice, WgpuDeviceOptions};

/// Command-line arguments
#[derive(Parser)]
#[command(version, about = "Verifies how a GPU decodes one byte store through UNORM, SNORM and sRGB views")]
struct Args {
    /// Run manifest (YAML); the bundled default manifest is used when omitted
    #[arg(long, conflicts_with = "aliasing")]
    manifest: Option<PathBuf>,

    /// Use the bundled manifest that adds a second UNORM view
    #[arg(long)]
    aliasing: bool,

    /// WGSL decode kernel replacing the bundled one
    #[arg(long)]
    kernel: Option<PathBuf>,

    /// Write the full report as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Number of columns of each view table
    #[arg(long, default_value_t = DEFAULT_COLUMNS)]
    columns: usize,

    /// Comma-separated backends to consider (vulkan, metal, dx12, gl)
    #[arg(long)]
    backend: Option<String>,

    /// Only accept a software fallback adapter
    #[arg(long)]
    fallback_adapter: bool,

    /// Reject views the device cannot alias directly instead of materializing them
    #[arg(long)]
    strict_aliasing: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, thiserror::Error)]
enum VerifyError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to read kernel {}: {source}", path.display())]
    Kernel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

async fn run(args: &Args) -> Result<ValidationReport, VerifyError> {
    let manifest = match &args.manifest {
        Some(path) => RunManifest::from_file(path)?,
        None if args.aliasing => RunManifest::aliasing()?,
        None => RunManifest::default_views()?,
    };
    let mut config = manifest.into_config();
    if let Some(path) = &args.kernel {
        config.kernel_source = std::fs::read_to_string(path).map_err(|source| VerifyError::Kernel { path: path.clone(), source })?;
    }

    let options = WgpuDeviceOptions {
        backends: args.backend.as_deref().map_or(wgpu::Backends::all(), wgpu::Backends::from_comma_list),
        force_fallback_adapter: args.fallback_adapter,
        materialize_incompatible_aliases: !args.strict_aliasing,
        ..Default::default()
    };
    let device = WgpuDevice::new(options).await?;

    let report = Harness::new(&device, config).run()?;
    print!("{}", ReportTable::new(&report, args.columns));

    if let Some(path) = &args.json {
        std::fs::write(path, report.to_json()?).map_err(|source| VerifyError::Report { path: path.clone(), source })?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }

    match run(&args).await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(err) => {
            eprintln!("✗ {err}");
            ExitCode::from(2)
        }
    }
}
