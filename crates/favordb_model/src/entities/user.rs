use super::{key_list_value, read_key_list, Anniversary, Photo};
use favordb_codec::{CodecResult, Record, Value};
use favordb_core::{Entity, PrimaryKey};
use std::collections::BTreeSet;

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Server-side user number.
    pub user_no: u64,
    /// Login email.
    pub email: String,
    /// Public handle.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Favor tag numbers the user picked. Unordered, no duplicates.
    pub favor_list: BTreeSet<i64>,
    /// The user's own anniversaries.
    pub anniversary_list: Vec<Anniversary>,
    /// Gifts the user owns.
    pub gift_list: Vec<PrimaryKey>,
    /// Reminders the user set.
    pub reminder_list: Vec<PrimaryKey>,
    /// The user's friends.
    pub friend_list: Vec<PrimaryKey>,
    /// Profile photo.
    pub user_photo: Option<Photo>,
    /// Profile background.
    pub background_photo: Option<Photo>,
}

impl User {
    /// Creates a user with empty lists and no photos.
    pub fn new(
        user_no: u64,
        email: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            user_no,
            email: email.into(),
            user_id: user_id.into(),
            name: name.into(),
            favor_list: BTreeSet::new(),
            anniversary_list: Vec::new(),
            gift_list: Vec::new(),
            reminder_list: Vec::new(),
            friend_list: Vec::new(),
            user_photo: None,
            background_photo: None,
        }
    }
}

impl Entity for User {
    const TYPE_NAME: &'static str = "User";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.user_no)
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("email", self.email.as_str())
            .with("user_id", self.user_id.as_str())
            .with("name", self.name.as_str())
            .with("favor_list", Value::int_set(self.favor_list.iter().copied()))
            .with("anniversary_list", Anniversary::list_value(&self.anniversary_list))
            .with("gift_list", key_list_value(&self.gift_list))
            .with("reminder_list", key_list_value(&self.reminder_list))
            .with("friend_list", key_list_value(&self.friend_list))
            .with("user_photo", Photo::optional_value(self.user_photo.as_ref()))
            .with(
                "background_photo",
                Photo::optional_value(self.background_photo.as_ref()),
            )
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            user_no: key.as_u64(),
            email: record.text("email")?.to_string(),
            user_id: record.text("user_id")?.to_string(),
            name: record.text("name")?.to_string(),
            favor_list: record.integers("favor_list")?.into_iter().collect(),
            anniversary_list: Anniversary::read_list(record, "anniversary_list")?,
            gift_list: read_key_list(record, "gift_list")?,
            reminder_list: read_key_list(record, "reminder_list")?,
            friend_list: read_key_list(record, "friend_list")?,
            user_photo: Photo::read_optional(record, "user_photo")?,
            background_photo: Photo::read_optional(record, "background_photo")?,
        })
    }
}
