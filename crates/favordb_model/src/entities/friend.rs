use super::{optional_key_value, optional_text_value, read_optional_key, Anniversary, Photo};
use favordb_codec::{CodecResult, Record, Value};
use favordb_core::{Entity, PrimaryKey};

/// Someone the user gives gifts to.
///
/// A friend may be linked to another Favor account through
/// [`Friend::friend_user_no`]; otherwise they only exist locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    /// Server-side friend number.
    pub friend_no: u64,
    /// Display name.
    pub name: String,
    /// Profile photo.
    pub profile_photo: Option<Photo>,
    /// Free-form note.
    pub memo: Option<String>,
    /// The linked account, if the friend uses Favor.
    pub friend_user_no: Option<PrimaryKey>,
    /// The friend's anniversaries.
    pub anniversary_list: Vec<Anniversary>,
    /// Favor tags, by name.
    pub favor_list: Vec<String>,
}

impl Friend {
    /// Creates a local friend with no extra details.
    pub fn new(friend_no: u64, name: impl Into<String>) -> Self {
        Self {
            friend_no,
            name: name.into(),
            profile_photo: None,
            memo: None,
            friend_user_no: None,
            anniversary_list: Vec::new(),
            favor_list: Vec::new(),
        }
    }

    /// Whether the friend is linked to a Favor account.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.friend_user_no.is_some()
    }
}

impl Entity for Friend {
    const TYPE_NAME: &'static str = "Friend";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.friend_no)
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("profile_photo", Photo::optional_value(self.profile_photo.as_ref()))
            .with("memo", optional_text_value(self.memo.as_deref()))
            .with("friend_user_no", optional_key_value(self.friend_user_no))
            .with("anniversary_list", Anniversary::list_value(&self.anniversary_list))
            .with(
                "favor_list",
                Value::List(self.favor_list.iter().map(|f| Value::from(f.as_str())).collect()),
            )
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            friend_no: key.as_u64(),
            name: record.text("name")?.to_string(),
            profile_photo: Photo::read_optional(record, "profile_photo")?,
            memo: record.optional_text("memo")?.map(str::to_string),
            friend_user_no: read_optional_key(record, "friend_user_no")?,
            anniversary_list: Anniversary::read_list(record, "anniversary_list")?,
            favor_list: record.texts("favor_list")?,
        })
    }
}
