use favordb_codec::{CodecResult, Record, Value};

/// A date worth remembering, embedded in a user or friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anniversary {
    /// Server-side anniversary number.
    pub anniversary_no: u64,
    /// Display title.
    pub title: String,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    /// Pinned anniversaries are listed first.
    pub is_pinned: bool,
}

impl Anniversary {
    /// Creates an unpinned anniversary.
    pub fn new(anniversary_no: u64, title: impl Into<String>, date: i64) -> Self {
        Self {
            anniversary_no,
            title: title.into(),
            date,
            is_pinned: false,
        }
    }

    /// Sorts pinned anniversaries first, newest registration first within
    /// each group.
    pub fn sort_for_display(list: &mut [Anniversary]) {
        list.reverse();
        list.sort_by_key(|a| !a.is_pinned);
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::Record(
            Record::new()
                .with("anniversary_no", self.anniversary_no as i64)
                .with("title", self.title.as_str())
                .with("date", self.date)
                .with("is_pinned", self.is_pinned),
        )
    }

    pub(crate) fn list_value(list: &[Anniversary]) -> Value {
        Value::List(list.iter().map(Anniversary::to_value).collect())
    }

    pub(crate) fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            anniversary_no: record.integer("anniversary_no")? as u64,
            title: record.text("title")?.to_string(),
            date: record.integer("date")?,
            is_pinned: record.boolean("is_pinned")?,
        })
    }

    pub(crate) fn read_list(record: &Record, field: &str) -> CodecResult<Vec<Self>> {
        record
            .records(field)?
            .iter()
            .map(Self::from_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_order_puts_pins_first() {
        let mut list = vec![
            Anniversary::new(1, "first date", 0),
            Anniversary {
                is_pinned: true,
                ..Anniversary::new(2, "birthday", 0)
            },
            Anniversary::new(3, "moving day", 0),
        ];
        Anniversary::sort_for_display(&mut list);
        let order: Vec<u64> = list.iter().map(|a| a.anniversary_no).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }
}
