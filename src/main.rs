use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glyphscribe_lib::{
    assess, load_config, load_references, save_config, DrawingSurface, FileModelSource,
    FontRenderer, GlyphRenderer, Mode, RecognitionRequest, Recognizer, RecognizerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "glyphscribe")]
#[command(author, version, about = "Offline handwritten Devanagari recognition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize a drawing and print the result as JSON
    Recognize {
        image: PathBuf,
        /// Force a pipeline instead of deciding from the drawing's shape
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Comma-separated candidate symbols for template matching
        #[arg(long, value_delimiter = ',')]
        candidates: Option<Vec<String>>,
        /// JSON file of saved reference drawings
        #[arg(long)]
        references: Option<PathBuf>,
        /// Font used to render references for symbols with no saved drawing
        #[arg(long)]
        font: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Grade the result against this symbol
        #[arg(long)]
        target: Option<String>,
    },
    /// Show which pipeline a drawing would go to
    Dispatch {
        image: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration
    InitConfig { path: PathBuf },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Glyph,
    Word,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Glyph => Mode::Glyph,
            ModeArg::Word => Mode::Word,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Commands::Recognize {
            image,
            mode,
            candidates,
            references,
            font,
            config,
            target,
        } => {
            let config = read_config(config.as_deref())?;
            let renderer: Option<Arc<dyn GlyphRenderer>> = match font {
                Some(path) => Some(Arc::new(
                    FontRenderer::from_file(&path)
                        .with_context(|| format!("loading font {}", path.display()))?,
                )),
                None => None,
            };
            let source = Arc::new(FileModelSource::new(config.models.clone()));
            let recognizer = Recognizer::new(config, source, renderer)?;

            let refs = references
                .map(|p| {
                    load_references(&p)
                        .with_context(|| format!("loading references {}", p.display()))
                })
                .transpose()?;
            let surface = open_surface(&image)?;

            let mut req = RecognitionRequest::new(&surface);
            if let Some(m) = mode {
                req = req.mode(m.into());
            }
            if let Some(c) = candidates.as_deref() {
                req = req.candidates(c);
            }
            if let Some(r) = refs.as_ref() {
                req = req.references(r);
            }

            let recognition = recognizer.recognize(&req)?;
            let output = match target {
                Some(t) => {
                    let assessment = assess(&recognition, &t, recognizer.confusables());
                    json!({ "recognition": recognition, "target": t, "assessment": assessment })
                }
                None => json!({ "recognition": recognition }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Dispatch { image, config } => {
            let config = read_config(config.as_deref())?;
            let recognizer = Recognizer::new(config, Arc::new(glyphscribe_lib::NoModels), None)?;
            let surface = open_surface(&image)?;
            let (mode, stats) = recognizer.dispatch(&surface);
            let output = json!({
                "mode": mode,
                "aspect_ratio": stats.aspect_ratio,
                "column_groups": stats.column_groups,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::InitConfig { path } => {
            save_config(&path, &RecognizerConfig::default())
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn read_config(path: Option<&Path>) -> Result<RecognizerConfig> {
    match path {
        Some(p) => load_config(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(RecognizerConfig::default()),
    }
}

fn open_surface(path: &Path) -> Result<DrawingSurface> {
    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
    DrawingSurface::from_image(&img).with_context(|| format!("reading drawing {}", path.display()))
}
