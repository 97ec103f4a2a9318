use super::{key_list_value, optional_text_value, read_key_list, Photo};
use crate::migrations::DEFAULT_PRIVATE_CATEGORY;
use favordb_codec::{CodecResult, Record};
use favordb_core::{Entity, PrimaryKey};

/// A gift the user gave or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    /// Server-side gift number.
    pub gift_no: u64,
    /// Gift name.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub date: Option<i64>,
    /// Free-form note.
    pub memo: Option<String>,
    /// Occasion category.
    pub category: String,
    /// How the user felt about it.
    pub emotion: Option<String>,
    /// Pinned gifts are listed first.
    pub is_pinned: bool,
    /// `true` if the user gave it, `false` if they received it.
    pub is_given: bool,
    /// The user's own category, shown on the timeline.
    pub private_category: String,
    /// Attached photos.
    pub photo_list: Vec<Photo>,
    /// Friends involved in the gift.
    pub friend_list: Vec<PrimaryKey>,
}

impl Gift {
    /// Creates a gift in `category` with the default private category.
    pub fn new(gift_no: u64, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            gift_no,
            name: name.into(),
            date: None,
            memo: None,
            category: category.into(),
            emotion: None,
            is_pinned: false,
            is_given: false,
            private_category: DEFAULT_PRIVATE_CATEGORY.to_string(),
            photo_list: Vec::new(),
            friend_list: Vec::new(),
        }
    }
}

impl Entity for Gift {
    const TYPE_NAME: &'static str = "Gift";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.gift_no)
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("date", self.date)
            .with("memo", optional_text_value(self.memo.as_deref()))
            .with("category", self.category.as_str())
            .with("emotion", optional_text_value(self.emotion.as_deref()))
            .with("is_pinned", self.is_pinned)
            .with("is_given", self.is_given)
            .with("private_category", self.private_category.as_str())
            .with("photo_list", Photo::list_value(&self.photo_list))
            .with("friend_list", key_list_value(&self.friend_list))
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            gift_no: key.as_u64(),
            name: record.text("name")?.to_string(),
            date: record.optional_integer("date")?,
            memo: record.optional_text("memo")?.map(str::to_string),
            category: record.text("category")?.to_string(),
            emotion: record.optional_text("emotion")?.map(str::to_string),
            is_pinned: record.boolean("is_pinned")?,
            is_given: record.boolean("is_given")?,
            private_category: record.text("private_category")?.to_string(),
            photo_list: Photo::read_list(record, "photo_list")?,
            friend_list: read_key_list(record, "friend_list")?,
        })
    }
}
