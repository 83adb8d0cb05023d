use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CloudError, Result},
    frequency::TableFilter,
    render::RenderOptions,
    tokenizer::{BoxedTokenizer, JiebaTokenizer, LazyTokenizer, ScoreTokenizer},
};

pub const DEFAULT_MIN_CORPUS_CHARS: usize = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// Left-part splitting from a word score table, for Korean text.
    #[default]
    Score,
    /// Dictionary segmentation for Chinese text.
    Jieba,
}

impl FromStr for TokenizerKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "score" => Ok(TokenizerKind::Score),
            "jieba" => Ok(TokenizerKind::Jieba),
            other => Err(CloudError::Config(format!("unknown tokenizer '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub kind: TokenizerKind,
    /// Model artifact. Required for `score`; `jieba` falls back to its
    /// bundled dictionary.
    pub model: Option<PathBuf>,
    pub tolerance: f64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        TokenizerConfig {
            kind: TokenizerKind::Score,
            model: Some(PathBuf::from("models/tokenizer.tsv")),
            tolerance: 0.0,
        }
    }
}

impl TokenizerConfig {
    /// A tokenizer that reads its model on first use.
    pub fn lazy(&self) -> LazyTokenizer<BoxedTokenizer> {
        let config = self.clone();
        let name = match (&config.kind, &config.model) {
            (kind, Some(model)) => format!("{kind:?} ({})", model.display()).to_lowercase(),
            (kind, None) => format!("{kind:?}").to_lowercase(),
        };

        LazyTokenizer::new(name, move || -> Result<BoxedTokenizer> {
            match (config.kind, &config.model) {
                (TokenizerKind::Score, Some(model)) => Ok(Box::new(
                    ScoreTokenizer::from_path(model)?.with_tolerance(config.tolerance),
                )),
                (TokenizerKind::Score, None) => Err(CloudError::unavailable(
                    "score tokenizer",
                    "no model path configured",
                )),
                (TokenizerKind::Jieba, Some(dict)) => {
                    Ok(Box::new(JiebaTokenizer::from_dict_path(dict)?))
                }
                (TokenizerKind::Jieba, None) => Ok(Box::new(JiebaTokenizer::default())),
            }
        })
    }
}

/// Everything a pipeline run can be tuned with. Every field has a default,
/// so a config file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub table: TableFilter,
    pub render: RenderOptions,
    pub min_corpus_chars: usize,
    pub asset_dir: PathBuf,
    pub tokenizer: TokenizerConfig,
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            table: TableFilter::default(),
            render: RenderOptions::default(),
            min_corpus_chars: DEFAULT_MIN_CORPUS_CHARS,
            asset_dir: PathBuf::from("resources"),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl CloudConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| CloudError::Config(format!("{}: {err}", path.display())))?;

        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: CloudConfig =
            serde_json::from_str(raw).map_err(|err| CloudError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.table
            .validate()
            .map_err(|err| CloudError::Config(err.to_string()))?;
        self.render.validate()
    }
}
