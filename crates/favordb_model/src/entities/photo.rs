use favordb_codec::{CodecResult, Record, Value};

/// An uploaded photo, embedded in users, friends and gifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    /// Server-side photo number.
    pub photo_no: u64,
    /// Where the image is served from.
    pub remote_url: String,
}

impl Photo {
    /// Creates a photo reference.
    pub fn new(photo_no: u64, remote_url: impl Into<String>) -> Self {
        Self {
            photo_no,
            remote_url: remote_url.into(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::Record(
            Record::new()
                .with("photo_no", self.photo_no as i64)
                .with("remote_url", self.remote_url.as_str()),
        )
    }

    pub(crate) fn optional_value(photo: Option<&Photo>) -> Value {
        photo.map_or(Value::Null, Photo::to_value)
    }

    pub(crate) fn list_value(photos: &[Photo]) -> Value {
        Value::List(photos.iter().map(Photo::to_value).collect())
    }

    pub(crate) fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            photo_no: record.integer("photo_no")? as u64,
            remote_url: record.text("remote_url")?.to_string(),
        })
    }

    pub(crate) fn read_optional(record: &Record, field: &str) -> CodecResult<Option<Self>> {
        record.optional_record(field)?.map(Self::from_record).transpose()
    }

    pub(crate) fn read_list(record: &Record, field: &str) -> CodecResult<Vec<Self>> {
        record
            .records(field)?
            .iter()
            .map(Self::from_record)
            .collect()
    }
}
