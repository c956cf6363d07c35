//! Case-insensitive word/code dictionary backing a prefix map's labels.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::pmap::key::{MAX_VALUE, NOT_FOUND};

/// Maps dictionary codes to words and back. The forward direction
/// (`code -> word`) is sparse (a skipped code simply has no entry); the
/// reverse direction (`word -> code`) is ordered by a case-folded key so
/// lookups are case-insensitive regardless of how a word was cased on
/// insertion.
#[derive(Default)]
pub struct Dictionary {
    by_code: BTreeMap<u32, String>,
    by_folded_word: BTreeMap<String, u32>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Associates `word` with `code`. Rejects a code outside
    /// `[0, MAX_VALUE]`, and rejects `word` (case-insensitively) already
    /// bound to a different code, returning that code. Re-inserting the same
    /// `(code, word)` pair is a no-op.
    pub fn insert(&mut self, code: u32, word: &str) -> Result<()> {
        if code > MAX_VALUE {
            return Err(CoreError::args("Dictionary::insert", format!("code {code} exceeds MAX_VALUE")));
        }
        let folded = word.to_lowercase();
        if let Some(&existing_code) = self.by_folded_word.get(&folded) {
            if existing_code != code {
                return Err(CoreError::Duplicate { code, existing_code });
            }
            return Ok(());
        }
        self.by_folded_word.insert(folded, code);
        self.by_code.insert(code, word.to_string());
        Ok(())
    }

    /// Looks up `word` case-insensitively, returning its bound code if any.
    pub fn lookup_word(&self, word: &str) -> Option<u32> {
        self.by_folded_word.get(&word.to_lowercase()).copied()
    }

    /// Returns the stored word for `code`, `"UNKNOWN"` for [`NOT_FOUND`], or
    /// a decimal rendering of `code` when no label has been registered.
    pub fn label_for(&self, code: u32) -> String {
        if code == NOT_FOUND {
            return "UNKNOWN".to_string();
        }
        match self.by_code.get(&code) {
            Some(word) => word.clone(),
            None => code.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Iterates `(code, word)` pairs in ascending code order, as needed by
    /// the on-disk dictionary-buffer writer.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_code.iter().map(|(&c, w)| (c, w.as_str()))
    }
}
