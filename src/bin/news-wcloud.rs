use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process,
};

use clap::{Args, Parser, Subcommand};
use news_wcloud::{
    AssetStore, CloudConfig, CloudError, CloudImage, Corpus, DisplaySurface, MaskPreset, Pipeline,
    Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "news-wcloud", version, about = "Draw a masked word cloud from news article text")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a word cloud from article files, or from stdin when none are given
    Render(RenderArgs),
    /// Write the four mask presets into a directory
    Presets {
        #[clap(long, default_value = "resources")]
        out: PathBuf,
        #[clap(long, default_value_t = 400)]
        size: u32,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Article bodies, one file per article
    files: Vec<PathBuf>,
    /// JSON config file; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,
    /// none, ellipse, speech-bubble or heart
    #[clap(long)]
    mask: Option<String>,
    #[clap(long)]
    max_words: Option<usize>,
    /// Directory with the mask presets and the font
    #[clap(long)]
    assets: Option<PathBuf>,
    /// score or jieba
    #[clap(long)]
    tokenizer: Option<String>,
    /// Tokenizer model artifact
    #[clap(long)]
    model: Option<PathBuf>,
    #[clap(long)]
    seed: Option<u64>,
    #[clap(short, long, default_value = "cloud.png")]
    output: PathBuf,
}

/// Saves the finished cloud as a PNG and reports progress through the log.
struct PngSurface {
    path: PathBuf,
    write_error: Option<CloudError>,
}

impl DisplaySurface for PngSurface {
    fn status(&mut self, message: &str) {
        info!("{message}");
    }

    fn show(&mut self, image: &CloudImage) {
        match image.image.save(&self.path) {
            Ok(()) => info!(path = %self.path.display(), words = image.words.len(), "word cloud saved"),
            Err(err) => {
                self.write_error = Some(CloudError::Io(io::Error::new(io::ErrorKind::Other, err)))
            }
        }
    }

    fn error(&mut self, error: &CloudError) {
        warn!(path = %self.path.display(), "no word cloud written: {error}");
    }
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = inner_main() {
        error!("{err}");
        process::exit(if err.is_user_facing() { 2 } else { 1 });
    }
}

fn inner_main() -> Result<()> {
    match Cli::parse().command {
        Command::Render(args) => render(args),
        Command::Presets { out, size } => {
            let written = AssetStore::new(out).write_presets(size)?;
            info!(files = written.len(), "mask presets written");
            Ok(())
        }
    }
}

fn render(args: RenderArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => CloudConfig::from_path(path)?,
        None => CloudConfig::default(),
    };
    if let Some(mask) = &args.mask {
        config.render.mask = MaskPreset::from_name(mask);
    }
    if let Some(max_words) = args.max_words {
        config.render.max_words = max_words;
    }
    if let Some(assets) = args.assets {
        config.asset_dir = assets;
    }
    if let Some(kind) = &args.tokenizer {
        config.tokenizer.kind = kind.parse()?;
        config.tokenizer.model = None;
    }
    if let Some(model) = args.model {
        config.tokenizer.model = Some(model);
    }
    if args.seed.is_some() {
        config.render.random_seed = args.seed;
    }

    let corpus = read_corpus(&args.files)?;
    let tokenizer = config.tokenizer.lazy();
    let mut pipeline = Pipeline::new(&tokenizer, &config)?;

    let mut surface = PngSurface {
        path: args.output,
        write_error: None,
    };
    pipeline.run_with_surface(&corpus, &mut surface)?;

    match surface.write_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn read_corpus(files: &[PathBuf]) -> Result<Corpus> {
    if files.is_empty() {
        let mut bytes = vec![];
        io::stdin().read_to_end(&mut bytes)?;
        return Corpus::from_utf8(bytes);
    }

    let mut corpus = Corpus::new();
    for path in files {
        let article = Corpus::from_utf8(fs::read(path)?)?;
        corpus.push_article(article.as_str());
    }
    info!(articles = files.len(), chars = corpus.char_count(), "corpus loaded");
    Ok(corpus)
}
