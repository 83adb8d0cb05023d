use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use tracing::{debug, info};

use crate::{
    assets::{AssetStore, FontHandle},
    config::CloudConfig,
    error::{CloudError, Result},
    frequency::{build_table, FrequencyTable, TableFilter},
    normalize::Normalizer,
    render::{CloudImage, WordCloud},
    tokenizer::Tokenizer,
};

/// Placed between article bodies when they are joined into one corpus.
pub const SEGMENT_SEPARATOR: &str = "\n";

/// Raw article text gathered for one keyword.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
    text: String,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus::default()
    }

    pub fn from_articles<I, S>(articles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus = Corpus::new();
        for article in articles {
            corpus.push_article(article.as_ref());
        }
        corpus
    }

    pub fn from_utf8(bytes: Vec<u8>) -> Result<Self> {
        String::from_utf8(bytes)
            .map(|text| Corpus { text })
            .map_err(|err| CloudError::MalformedInput(format!("corpus is not valid UTF-8: {err}")))
    }

    pub fn push_article(&mut self, body: &str) {
        self.text.push_str(body);
        self.text.push_str(SEGMENT_SEPARATOR);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<String> for Corpus {
    fn from(text: String) -> Self {
        Corpus { text }
    }
}

/// Where progress, the finished cloud, or the failure ends up.
pub trait DisplaySurface {
    fn status(&mut self, message: &str);
    fn show(&mut self, image: &CloudImage);
    fn error(&mut self, error: &CloudError);
}

/// Runs normalize, tokenize, count and render over one corpus at a time.
pub struct Pipeline<'a, T: ?Sized> {
    tokenizer: &'a T,
    normalizer: Normalizer,
    filter: TableFilter,
    renderer: WordCloud,
    assets: AssetStore,
    font: OnceLock<FontHandle>,
    min_corpus_chars: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, T: Tokenizer + ?Sized> Pipeline<'a, T> {
    pub fn new(tokenizer: &'a T, config: &CloudConfig) -> Result<Self> {
        config.validate()?;

        Ok(Pipeline {
            tokenizer,
            normalizer: Normalizer::default(),
            filter: config.table,
            renderer: WordCloud::new(config.render.clone())?,
            assets: AssetStore::new(&config.asset_dir)
                .with_mask_threshold(config.render.mask_threshold),
            font: OnceLock::new(),
            min_corpus_chars: config.min_corpus_chars,
            cancel: None,
        })
    }

    /// Uses `font` instead of the one in the asset directory.
    pub fn with_font(mut self, font: FontHandle) -> Self {
        self.font = OnceLock::from(font);
        self
    }

    /// Checked between stages; once set, the run stops with
    /// [`CloudError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(&mut self, corpus: &Corpus) -> Result<CloudImage> {
        let table = self.frequencies(corpus)?;
        if table.is_empty() {
            return Err(CloudError::InsufficientData(
                "no token survived the length and count filters".to_owned(),
            ));
        }

        self.checkpoint("render")?;
        let font = self.font()?;
        let options = self.renderer.options();
        self.renderer
            .render(&table, options.mask, options.max_words, font, &self.assets)
    }

    /// Everything up to and including the ranked table.
    pub fn frequencies(&mut self, corpus: &Corpus) -> Result<FrequencyTable> {
        self.checkpoint("normalize")?;
        let chars = corpus.char_count();
        if chars <= self.min_corpus_chars {
            return Err(CloudError::InsufficientData(format!(
                "corpus has {chars} characters, more than {} are needed",
                self.min_corpus_chars
            )));
        }
        let text = self.normalizer.normalize(corpus.as_str());
        debug!(chars, normalized = text.len(), "corpus normalized");

        self.checkpoint("tokenize")?;
        let tokens = self.tokenizer.tokenize(&text)?;
        validate_tokens(&tokens)?;
        debug!(tokens = tokens.len(), "corpus tokenized");

        self.checkpoint("count")?;
        let table = build_table(&tokens, &self.filter);
        debug!(entries = table.len(), top = ?table.top(5), "frequency table built");

        Ok(table)
    }

    /// [`Pipeline::run`] reporting progress and outcome to `surface`.
    pub fn run_with_surface(
        &mut self,
        corpus: &Corpus,
        surface: &mut dyn DisplaySurface,
    ) -> Result<()> {
        surface.status("generating word cloud");

        match self.run(corpus) {
            Ok(image) => {
                info!(words = image.words.len(), "word cloud ready");
                surface.show(&image);
                Ok(())
            }
            Err(err) => {
                surface.error(&err);
                Err(err)
            }
        }
    }

    fn font(&self) -> Result<&FontHandle> {
        if let Some(font) = self.font.get() {
            return Ok(font);
        }
        let loaded = self.assets.load_font()?;
        Ok(self.font.get_or_init(|| loaded))
    }

    fn checkpoint(&self, stage: &'static str) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(CloudError::Cancelled(stage)),
            _ => Ok(()),
        }
    }
}

fn validate_tokens(tokens: &[String]) -> Result<()> {
    match tokens.iter().position(|token| token.is_empty()) {
        Some(idx) => Err(CloudError::MalformedInput(format!(
            "tokenizer produced an empty token at position {idx}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{Corpus, SEGMENT_SEPARATOR};
    use crate::{
        assets::FontHandle,
        config::CloudConfig,
        error::{CloudError, Result},
        tokenizer::Tokenizer,
    };

    struct Whitespace {
        calls: Cell<usize>,
    }

    impl Tokenizer for Whitespace {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            Ok(text.split_whitespace().map(str::to_owned).collect())
        }
    }

    struct EmptyTokens;

    impl Tokenizer for EmptyTokens {
        fn tokenize(&self, _: &str) -> Result<Vec<String>> {
            Ok(vec!["경제".into(), String::new()])
        }
    }

    #[test]
    fn corpus_joins_articles() {
        let corpus = Corpus::from_articles(["첫 기사", "둘째 기사"]);
        assert_eq!(
            corpus.as_str(),
            format!("첫 기사{SEGMENT_SEPARATOR}둘째 기사{SEGMENT_SEPARATOR}")
        );
        assert_eq!(corpus.char_count(), 11);
        assert!(Corpus::new().is_empty());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        assert!(matches!(
            Corpus::from_utf8(vec![0xff, 0xfe, 0x00]),
            Err(CloudError::MalformedInput(_))
        ));
        assert_eq!(
            Corpus::from_utf8("뉴스".as_bytes().to_vec()).unwrap().as_str(),
            "뉴스"
        );
    }

    #[test]
    fn short_corpus_skips_tokenizer() {
        let tokenizer = Whitespace {
            calls: Cell::new(0),
        };
        let mut pipeline = super::Pipeline::new(&tokenizer, &CloudConfig::default()).unwrap();

        let corpus = Corpus::from("가".repeat(50));
        let err = pipeline.frequencies(&corpus).unwrap_err();
        assert!(matches!(err, CloudError::InsufficientData(_)));
        assert_eq!(tokenizer.calls.get(), 0);

        let exactly_min = Corpus::from("가".repeat(100));
        assert!(matches!(
            pipeline.frequencies(&exactly_min),
            Err(CloudError::InsufficientData(_))
        ));
        assert_eq!(tokenizer.calls.get(), 0);
    }

    #[test]
    fn counts_tokens_from_long_corpus() {
        let tokenizer = Whitespace {
            calls: Cell::new(0),
        };
        let mut pipeline = super::Pipeline::new(&tokenizer, &CloudConfig::default()).unwrap();

        let text = "경제 성장 경제 물가 2024년 GDP 발표! ".repeat(10);
        let table = pipeline.frequencies(&Corpus::from(text)).unwrap();

        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(pairs[0], ("경제", 20));
        assert!(pairs.contains(&("성장", 10)));
        assert!(pairs.contains(&("물가", 10)));
        assert!(pairs.iter().all(|(token, _)| !token.contains("GDP")));
        assert_eq!(tokenizer.calls.get(), 1);
    }

    #[test]
    fn later_font_replaces_earlier_one() {
        let bytes = std::fs::read(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/DejaVuSans.ttf"
        ))
        .unwrap();
        let first = FontHandle::from_bytes("first", bytes.clone()).unwrap();
        let second = FontHandle::from_bytes("second", bytes).unwrap();

        let pipeline = super::Pipeline::new(&EmptyTokens, &CloudConfig::default())
            .unwrap()
            .with_font(first)
            .with_font(second);
        assert_eq!(pipeline.font().unwrap().name(), "second");
    }

    #[test]
    fn empty_tokens_are_rejected() {
        let mut pipeline = super::Pipeline::new(&EmptyTokens, &CloudConfig::default()).unwrap();
        let corpus = Corpus::from("뉴스 ".repeat(60));
        assert!(matches!(
            pipeline.frequencies(&corpus),
            Err(CloudError::MalformedInput(_))
        ));
    }
}
