use super::{optional_key_value, optional_text_value, read_optional_key};
use favordb_codec::{CodecResult, Record};
use favordb_core::{Entity, PrimaryKey};

/// A dated reminder, optionally about a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Server-side reminder number.
    pub reminder_no: u64,
    /// Display title.
    pub title: String,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    /// Free-form note.
    pub memo: Option<String>,
    /// Whether a local notification is scheduled.
    pub should_notify: bool,
    /// When to notify, in milliseconds since the Unix epoch.
    pub notify_time: Option<i64>,
    /// The friend the reminder is about.
    pub friend_no: Option<PrimaryKey>,
}

impl Reminder {
    /// Creates a reminder without notification.
    pub fn new(reminder_no: u64, title: impl Into<String>, date: i64) -> Self {
        Self {
            reminder_no,
            title: title.into(),
            date,
            memo: None,
            should_notify: false,
            notify_time: None,
            friend_no: None,
        }
    }
}

impl Entity for Reminder {
    const TYPE_NAME: &'static str = "Reminder";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.reminder_no)
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("title", self.title.as_str())
            .with("date", self.date)
            .with("memo", optional_text_value(self.memo.as_deref()))
            .with("should_notify", self.should_notify)
            .with("notify_time", self.notify_time)
            .with("friend_no", optional_key_value(self.friend_no))
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            reminder_no: key.as_u64(),
            title: record.text("title")?.to_string(),
            date: record.integer("date")?,
            memo: record.optional_text("memo")?.map(str::to_string),
            should_notify: record.boolean("should_notify")?,
            notify_time: record.optional_integer("notify_time")?,
            friend_no: read_optional_key(record, "friend_no")?,
        })
    }
}
