use favordb_codec::{CodecResult, Record};
use favordb_core::{Entity, PrimaryKey};
use sha2::{Digest, Sha256};

/// A search the user ran, kept for the recent-search list.
///
/// The key is derived from the search text, so searching the same text
/// again replaces the old entry instead of adding one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentSearch {
    key: PrimaryKey,
    /// What was searched.
    pub search_text: String,
    /// Milliseconds since the Unix epoch.
    pub search_date: i64,
}

impl RecentSearch {
    /// Records a search for `search_text` at `search_date`.
    pub fn new(search_text: impl Into<String>, search_date: i64) -> Self {
        let search_text = search_text.into();
        Self {
            key: Self::key_for(&search_text),
            search_text,
            search_date,
        }
    }

    /// The key a search for `search_text` is stored under.
    #[must_use]
    pub fn key_for(search_text: &str) -> PrimaryKey {
        let digest = Sha256::digest(search_text.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        PrimaryKey::new(u64::from_be_bytes(head))
    }

    /// Newest first.
    pub fn sort_newest_first(list: &mut [RecentSearch]) {
        list.sort_by(|a, b| b.search_date.cmp(&a.search_date));
    }
}

impl Entity for RecentSearch {
    const TYPE_NAME: &'static str = "RecentSearch";

    fn primary_key(&self) -> PrimaryKey {
        self.key
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("search_text", self.search_text.as_str())
            .with("search_date", self.search_date)
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            key,
            search_text: record.text("search_text")?.to_string(),
            search_date: record.integer("search_date")?,
        })
    }
}
