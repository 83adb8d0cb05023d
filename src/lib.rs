//! Turns a pile of news article text into a word cloud drawn inside a mask.
//!
//! The stages are [`normalize`], a [`Tokenizer`], [`build_table`] and
//! [`WordCloud::render`]; [`Pipeline`] strings them together for one corpus.

pub use assets::{AssetStore, FontHandle, FONT_FILE};
pub use config::{CloudConfig, TokenizerConfig, TokenizerKind, DEFAULT_MIN_CORPUS_CHARS};
pub use error::{CloudError, Result};
pub use frequency::{build_table, FrequencyTable, TableFilter};
pub use mask::{Mask, MaskPreset, DEFAULT_MASK_THRESHOLD};
pub use normalize::{normalize, Normalizer};
pub use pipeline::{Corpus, DisplaySurface, Pipeline, SEGMENT_SEPARATOR};
pub use render::{CloudImage, ColorFunc, PlacedWord, RenderOptions, WordCloud};
pub use tokenizer::{BoxedTokenizer, JiebaTokenizer, LazyTokenizer, ScoreTokenizer, Tokenizer};

pub mod assets;
pub mod config;
pub mod error;
pub mod frequency;
pub mod mask;
pub mod normalize;
pub mod pipeline;
pub mod render;
mod sat;
mod text;
pub mod tokenizer;
