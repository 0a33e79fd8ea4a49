mod display;
mod source;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cropscan_ai::Pipeline;
use cropscan_core::{FitMode, LayoutHint, PipelineConfig};
use tracing::Level;

use crate::display::{Display, Format};
use crate::source::ImageSource;

/// Classify crop photos with an on-device image classification model.
#[derive(Parser)]
#[command(name = "cropscan", version)]
struct Cli {
    /// JSON pipeline config; flags below override it.
    #[arg(long, global = true, env = "CROPSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// ONNX model file.
    #[arg(long, global = true, env = "CROPSCAN_MODEL")]
    model: Option<PathBuf>,

    /// Label file, one class per line in output order.
    #[arg(long, global = true, env = "CROPSCAN_LABELS")]
    labels: Option<PathBuf>,

    /// How to bring images to the model's aspect ratio.
    #[arg(long, global = true, value_enum)]
    fit: Option<FitArg>,

    /// Input tensor memory layout.
    #[arg(long, global = true, value_enum)]
    layout: Option<LayoutArg>,

    /// Print one JSON object per line.
    #[arg(long, global = true)]
    json: bool,

    /// Log pipeline steps.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify images; `-` reads a single capture from stdin.
    Classify {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Show the model's input/output tensors and label count.
    Inspect,
}

#[derive(Clone, Copy, ValueEnum)]
enum FitArg {
    Crop,
    Pad,
    Exact,
}

impl From<FitArg> for FitMode {
    fn from(arg: FitArg) -> Self {
        match arg {
            FitArg::Crop => Self::Crop,
            FitArg::Pad => Self::Pad,
            FitArg::Exact => Self::Exact,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Auto,
    Nhwc,
    Nchw,
}

impl From<LayoutArg> for LayoutHint {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Auto => Self::Auto,
            LayoutArg::Nhwc => Self::Nhwc,
            LayoutArg::Nchw => Self::Nchw,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::WARN
    } else if cli.verbose > 0 {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("cropscan v{}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&cli)?;
    let format = if cli.json { Format::Json } else { Format::Text };
    let mut display = Display::new(std::io::stdout().lock(), format);

    let mut pipeline = Pipeline::load(&config);
    if let Some(err) = pipeline.load_error() {
        anyhow::bail!("cannot classify: {err}");
    }

    match &cli.command {
        Command::Inspect => {
            let context = pipeline.context().context("pipeline not ready")?;
            display.inspect(&config.model_path.display().to_string(), context)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify { images } => {
            let mut failures = 0usize;
            for arg in images {
                let source = ImageSource::from_arg(arg);
                let name = source.name();

                let image = match source.acquire() {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::warn!(source = %name, error = %e, "could not read image");
                        display.failure(&name, &e)?;
                        failures += 1;
                        continue;
                    }
                };

                match pipeline.classify(&image) {
                    Ok(prediction) => display.prediction(&name, &prediction)?,
                    Err(e) => {
                        display.failure(&name, &e)?;
                        failures += 1;
                    }
                }
            }
            display.into_inner().flush()?;

            if failures > 0 {
                tracing::warn!(failures, total = images.len(), "some images were not classified");
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(model) = &cli.model {
        config.model_path.clone_from(model);
    }
    if let Some(labels) = &cli.labels {
        config.labels_path.clone_from(labels);
    }
    if let Some(fit) = cli.fit {
        config.preprocess.fit = fit.into();
    }
    if let Some(layout) = cli.layout {
        config.preprocess.layout = layout.into();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "cropscan",
            "--model",
            "plants.onnx",
            "--fit",
            "exact",
            "--layout",
            "nchw",
            "classify",
            "leaf.jpg",
        ])
        .unwrap();

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.model_path, PathBuf::from("plants.onnx"));
        assert_eq!(config.labels_path, PipelineConfig::default().labels_path);
        assert_eq!(config.preprocess.fit, FitMode::Exact);
        assert_eq!(config.preprocess.layout, LayoutHint::Nchw);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cropscan.json");
        std::fs::write(
            &path,
            r#"{"model_path": "from_file.onnx", "labels_path": "from_file.txt"}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "cropscan",
            "inspect",
            "--config",
            path.to_str().unwrap(),
            "--labels",
            "override.txt",
        ])
        .unwrap();

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.model_path, PathBuf::from("from_file.onnx"));
        assert_eq!(config.labels_path, PathBuf::from("override.txt"));
    }

    #[test]
    fn classify_requires_images() {
        assert!(Cli::try_parse_from(["cropscan", "classify"]).is_err());
    }
}
