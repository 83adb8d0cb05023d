use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::OnceLock,
};

use jieba_rs::Jieba;
use tracing::{debug, info};

use crate::error::{CloudError, Result};

/// Splits normalized text into a flat token sequence.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;
}

pub type BoxedTokenizer = Box<dyn Tokenizer + Send + Sync>;

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        (**self).tokenize(text)
    }
}

const MIN_LEFT_CHARS: usize = 2;

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A tokenizer model that is loaded on first use and then kept for the
/// lifetime of this value.
///
/// The host constructs one and hands it to every pipeline run. A failed load
/// is reported as [`CloudError::ResourceUnavailable`] and attempted again on
/// the next call; a successful load is never repeated.
pub struct LazyTokenizer<T> {
    name: String,
    loader: Loader<T>,
    model: OnceLock<T>,
}

impl<T: Tokenizer> LazyTokenizer<T> {
    pub fn new(
        name: impl Into<String>,
        loader: impl Fn() -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        LazyTokenizer {
            name: name.into(),
            loader: Box::new(loader),
            model: OnceLock::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn get(&self) -> Result<&T> {
        if let Some(model) = self.model.get() {
            return Ok(model);
        }

        info!(model = %self.name, "loading tokenizer model");
        let loaded = (self.loader)().map_err(|err| match err {
            err @ CloudError::ResourceUnavailable { .. } => err,
            other => CloudError::unavailable(format!("tokenizer '{}'", self.name), other),
        })?;

        Ok(self.model.get_or_init(|| loaded))
    }
}

impl<T: Tokenizer> Tokenizer for LazyTokenizer<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        self.get()?.tokenize(text)
    }
}

/// Left-part tokenizer driven by a table of word scores.
///
/// Every whitespace separated chunk is cut once into a left part, chosen as
/// the prefix with the best score, and the remainder. This suits agglutinative
/// text such as Korean where a noun is followed by particles and endings.
///
/// A left part is at least two characters long, so chunks of one or two
/// characters are never split.
#[derive(Clone, Debug)]
pub struct ScoreTokenizer {
    scores: HashMap<String, f64>,
    tolerance: f64,
}

impl ScoreTokenizer {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        ScoreTokenizer {
            scores,
            tolerance: 0.0,
        }
    }

    /// Prefixes scoring within `value` of the best one are all eligible and
    /// the longest of them wins.
    pub fn with_tolerance(mut self, value: f64) -> Self {
        self.tolerance = value.max(0.0);
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let resource = format!("score model {}", path.display());
        let file = File::open(path).map_err(|err| CloudError::unavailable(&resource, err))?;

        Self::from_reader(&resource, BufReader::new(file))
    }

    /// Reads `word<TAB>score` lines. Blank lines and `#` comments are skipped.
    pub fn from_reader<R: BufRead>(resource: &str, reader: R) -> Result<Self> {
        let mut scores = HashMap::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| CloudError::unavailable(resource, err))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = || {
                CloudError::unavailable(
                    resource,
                    format!("line {}: expected 'word<TAB>score', got {line:?}", number + 1),
                )
            };

            let (word, score) = line.split_once('\t').ok_or_else(malformed)?;
            let score: f64 = score.trim().parse().map_err(|_| malformed())?;
            if word.is_empty() || !score.is_finite() {
                return Err(malformed());
            }

            scores.insert(word.to_owned(), score);
        }

        debug!(words = scores.len(), "score model parsed");
        Ok(ScoreTokenizer::new(scores))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn score(&self, word: &str) -> f64 {
        self.scores.get(word).copied().unwrap_or(0.0)
    }

    fn split<'a>(&self, chunk: &'a str) -> (&'a str, &'a str) {
        if chunk.chars().count() <= MIN_LEFT_CHARS {
            return (chunk, "");
        }

        let candidates = chunk
            .char_indices()
            .skip(MIN_LEFT_CHARS)
            .map(|(idx, _)| idx)
            .chain(std::iter::once(chunk.len()))
            .map(|end| (end, self.score(&chunk[..end])));

        let end = if self.tolerance > 0.0 {
            let candidates: Vec<_> = candidates.collect();
            let best = candidates
                .iter()
                .map(|(_, score)| *score)
                .fold(f64::NEG_INFINITY, f64::max);

            candidates
                .into_iter()
                .filter(|(_, score)| best - score <= self.tolerance)
                .map(|(end, _)| end)
                .max()
        } else {
            // ties on score go to the longer prefix
            candidates
                .fold(None, |best: Option<(usize, f64)>, (end, score)| match best {
                    Some((_, best_score)) if best_score > score => best,
                    _ => Some((end, score)),
                })
                .map(|(end, _)| end)
        };

        chunk.split_at(end.unwrap_or(chunk.len()))
    }
}

impl Tokenizer for ScoreTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let tokens = text
            .split_whitespace()
            .flat_map(|chunk| {
                let (left, right) = self.split(chunk);
                [left, right]
            })
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(tokens)
    }
}

/// Dictionary based segmentation for Chinese text.
pub struct JiebaTokenizer {
    pub jieba: Jieba,
    pub hmm: bool,
}

impl Default for JiebaTokenizer {
    fn default() -> Self {
        JiebaTokenizer {
            jieba: Jieba::new(),
            hmm: false,
        }
    }
}

impl JiebaTokenizer {
    pub fn from_dict_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let resource = format!("jieba dictionary {}", path.display());
        let file = File::open(path).map_err(|err| CloudError::unavailable(&resource, err))?;
        let jieba = Jieba::with_dict(&mut BufReader::new(file))
            .map_err(|err| CloudError::unavailable(&resource, err))?;

        Ok(JiebaTokenizer { jieba, hmm: false })
    }

    pub fn with_word(mut self, word: &str) -> Self {
        self.jieba.add_word(word, None, None);
        self
    }

    pub fn with_hmm(mut self, value: bool) -> Self {
        self.hmm = value;
        self
    }
}

impl Tokenizer for JiebaTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .jieba
            .cut(text, self.hmm)
            .into_iter()
            .filter(|word| !word.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        io::Cursor,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use super::{JiebaTokenizer, LazyTokenizer, ScoreTokenizer, Tokenizer};
    use crate::error::CloudError;

    fn scores(pairs: &[(&str, f64)]) -> ScoreTokenizer {
        ScoreTokenizer::new(
            pairs
                .iter()
                .map(|(word, score)| (word.to_string(), *score))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn splits_each_chunk_at_best_prefix() {
        let tokenizer = scores(&[("경제", 0.8), ("성장", 0.9)]);
        let tokens = tokenizer.tokenize("경제는 성장했다 뉴스").unwrap();
        assert_eq!(tokens, vec!["경제", "는", "성장", "했다", "뉴스"]);
    }

    #[test]
    fn short_chunks_stay_whole() {
        let tokenizer = scores(&[("국", 1.0), ("가", 0.5)]);
        assert_eq!(tokenizer.tokenize("국가").unwrap(), vec!["국가"]);
        assert_eq!(tokenizer.tokenize("국 가").unwrap(), vec!["국", "가"]);
    }

    #[test]
    fn left_part_has_at_least_two_chars() {
        let tokenizer = scores(&[("국", 1.0)]);
        assert_eq!(tokenizer.tokenize("국가는").unwrap(), vec!["국가는"]);

        let tokenizer = scores(&[("국", 1.0), ("국가", 0.4)]);
        assert_eq!(tokenizer.tokenize("국가는").unwrap(), vec!["국가", "는"]);
    }

    #[test]
    fn tolerance_picks_longest_eligible_prefix() {
        let tokenizer = scores(&[("정부", 0.9), ("정부기관", 0.85)]);
        assert_eq!(
            tokenizer.tokenize("정부기관은").unwrap(),
            vec!["정부", "기관은"]
        );

        let tolerant = tokenizer.clone().with_tolerance(0.1);
        assert_eq!(
            tolerant.tokenize("정부기관은").unwrap(),
            vec!["정부기관", "은"]
        );

        let strict = tokenizer.with_tolerance(0.01);
        assert_eq!(strict.tokenize("정부기관은").unwrap(), vec!["정부", "기관은"]);
    }

    #[test]
    fn tolerance_prefers_longer_prefix() {
        let tokenizer = scores(&[("경제", 0.8), ("경제성", 0.75)]);
        assert_eq!(tokenizer.tokenize("경제성장").unwrap(), vec!["경제", "성장"]);

        let tokenizer = tokenizer.with_tolerance(0.1);
        assert_eq!(tokenizer.tokenize("경제성장").unwrap(), vec!["경제성", "장"]);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        let tokenizer = scores(&[]);
        assert!(tokenizer.tokenize("").unwrap().is_empty());
        assert!(tokenizer.tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn reads_score_model() {
        let model = "# scores\n경제\t0.8\n\n성장\t0.5\n";
        let tokenizer = ScoreTokenizer::from_reader("test", Cursor::new(model)).unwrap();
        assert_eq!(tokenizer.len(), 2);
        assert_eq!(tokenizer.tokenize("경제가").unwrap(), vec!["경제", "가"]);
    }

    #[test]
    fn malformed_model_is_unavailable() {
        let err = ScoreTokenizer::from_reader("test", Cursor::new("경제 zero\n")).unwrap_err();
        assert!(matches!(err, CloudError::ResourceUnavailable { .. }));

        let err = ScoreTokenizer::from_reader("test", Cursor::new("경제\tNaN\n")).unwrap_err();
        assert!(matches!(err, CloudError::ResourceUnavailable { .. }));
    }

    #[test]
    fn missing_model_file_is_unavailable() {
        let err = ScoreTokenizer::from_path("/nonexistent/model.tsv").unwrap_err();
        assert!(matches!(err, CloudError::ResourceUnavailable { .. }));
    }

    #[test]
    fn lazy_tokenizer_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyTokenizer::new("counting", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(scores(&[("정치", 1.0)]))
        });

        assert!(!lazy.is_loaded());
        assert_eq!(lazy.tokenize("정치권").unwrap(), vec!["정치", "권"]);
        assert_eq!(lazy.tokenize("정치").unwrap(), vec!["정치"]);
        assert!(lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_tokenizer_reports_load_failure() {
        let lazy: LazyTokenizer<ScoreTokenizer> = LazyTokenizer::new("broken", || {
            Err(CloudError::MalformedInput("corrupt artifact".into()))
        });

        let err = lazy.tokenize("경제").unwrap_err();
        assert!(matches!(err, CloudError::ResourceUnavailable { .. }));
        assert!(err.to_string().contains("broken"));
        assert!(!lazy.is_loaded());
    }

    #[test]
    fn jieba_user_words_and_hmm() {
        let tokenizer = JiebaTokenizer::default().with_word("叛徒们");
        let tokens = tokenizer.tokenize("叛徒们来了").unwrap();
        assert_eq!(tokens.first().map(String::as_str), Some("叛徒们"));

        let tokenizer = tokenizer.with_hmm(true);
        assert!(tokenizer.hmm);
        assert!(tokenizer.tokenize("叛徒们来了").unwrap().contains(&"叛徒们".to_string()));
    }

    #[test]
    fn jieba_drops_whitespace() {
        let tokenizer = JiebaTokenizer::default();
        let tokens = tokenizer.tokenize("我们中出了一个叛徒 我们").unwrap();
        assert!(tokens.iter().all(|token| !token.trim().is_empty()));
        assert_eq!(tokens.first().map(String::as_str), Some("我们"));
        assert!(tokens.contains(&"叛徒".to_string()));
    }
}
