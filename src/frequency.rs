use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};

/// Length window and minimum count applied to tokens before ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFilter {
    pub nmin: usize,
    pub nmax: usize,
    pub ncut: usize,
}

impl Default for TableFilter {
    fn default() -> Self {
        TableFilter {
            nmin: 2,
            nmax: 5,
            ncut: 1,
        }
    }
}

impl TableFilter {
    pub fn validate(&self) -> Result<()> {
        if self.nmin > self.nmax {
            return Err(CloudError::MalformedInput(format!(
                "token length window is empty: nmin {} > nmax {}",
                self.nmin, self.nmax
            )));
        }
        if self.ncut == 0 {
            return Err(CloudError::MalformedInput(
                "ncut must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    fn accepts_length(&self, token: &str) -> bool {
        let chars = token.chars().count();
        chars >= self.nmin && chars <= self.nmax
    }
}

/// Tokens ranked by descending count. Equal counts keep first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, usize)>,
}

impl FrequencyTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(token, count)| (token.as_str(), *count))
    }

    pub fn top(&self, n: usize) -> &[(String, usize)] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn max_count(&self) -> Option<usize> {
        self.entries.first().map(|(_, count)| *count)
    }
}

impl From<Vec<(String, usize)>> for FrequencyTable {
    /// Re-ranks arbitrary pairs so the ordering guarantee still holds.
    fn from(mut entries: Vec<(String, usize)>) -> Self {
        entries.retain(|(_, count)| *count > 0);
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        FrequencyTable { entries }
    }
}

pub fn build_table<S: AsRef<str>>(tokens: &[S], filter: &TableFilter) -> FrequencyTable {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<(&str, usize)> = Vec::new();

    for token in tokens.iter().map(AsRef::as_ref) {
        if !filter.accepts_length(token) {
            continue;
        }
        match index.get(token) {
            Some(&slot) => entries[slot].1 += 1,
            None => {
                index.insert(token, entries.len());
                entries.push((token, 1));
            }
        }
    }

    entries.retain(|(_, count)| *count >= filter.ncut);
    // stable, so ties stay in first-seen order
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    FrequencyTable {
        entries: entries
            .into_iter()
            .map(|(token, count)| (token.to_owned(), count))
            .collect(),
    }
}
