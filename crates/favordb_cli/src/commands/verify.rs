//! Verify command implementation.

use super::{open_copy, read_store};
use favordb_core::{Engine, Entity, Scan, SchemaVersion};
use favordb_model::{Friend, Gift, RecentSearch, Reminder, User, TARGET_SCHEMA_VERSION};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records decoded.
    pub records_checked: usize,
    /// Records that failed to decode.
    pub errors: Vec<String>,
    /// Problems that the next open repairs or handles.
    pub warnings: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command. The file is never modified.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {}", path.display());
    println!();

    let data = read_store(path)?;
    let result = verify(data)?;

    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for error in &result.errors {
        println!("  error: {error}");
    }
    println!("Records checked: {}", result.records_checked);
    println!();

    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

/// Checks a store image. Frame damage before the tail is an `Err`; record
/// problems are collected in the result.
pub fn verify(data: Vec<u8>) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    let scan = Scan::read(&data)?;
    if let Some(reason) = &scan.torn {
        result.warnings.push(format!(
            "{} bytes after offset {} will be truncated on open: {reason}",
            data.len() as u64 - scan.valid_len,
            scan.valid_len
        ));
    }

    let engine = open_copy(data)?;
    let target = SchemaVersion::new(TARGET_SCHEMA_VERSION);
    let version = engine.schema_version();

    if version < target {
        // Older records are checked by the migration steps instead.
        result
            .warnings
            .push(format!("store is at {version}, current is {target}"));
        match engine.preview_migration(&favordb_model::favor_migrations()?) {
            Ok(report) => result.records_checked += report.records_touched(),
            Err(e) => result.errors.push(e.to_string()),
        }
        return Ok(result);
    }
    if version > target {
        result
            .errors
            .push(format!("store is at {version}, newer than {target}"));
        return Ok(result);
    }

    check::<User>(&engine, &mut result);
    check::<Friend>(&engine, &mut result);
    check::<Gift>(&engine, &mut result);
    check::<Reminder>(&engine, &mut result);
    check::<RecentSearch>(&engine, &mut result);

    let known = [
        User::TYPE_NAME,
        Friend::TYPE_NAME,
        Gift::TYPE_NAME,
        Reminder::TYPE_NAME,
        RecentSearch::TYPE_NAME,
    ];
    for entity_type in engine.entity_types() {
        if !known.contains(&entity_type) {
            result
                .warnings
                .push(format!("unknown entity type `{entity_type}`"));
        }
    }

    Ok(result)
}

fn check<T: Entity>(engine: &Engine, result: &mut VerifyResult) {
    for (key, record) in engine.records(T::TYPE_NAME) {
        result.records_checked += 1;
        if let Err(e) = T::from_record(key, record) {
            result
                .errors
                .push(format!("{} {key}: {e}", T::TYPE_NAME));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use favordb_codec::Record;
    use favordb_core::format::{Frame, Header, Op};
    use favordb_core::{PrimaryKey, SequenceNumber};

    fn image(version: u64, ops: Vec<Op>) -> Vec<u8> {
        let mut data = Header::new(SchemaVersion::new(version)).encode().to_vec();
        data.extend(
            Frame {
                seq: SequenceNumber::new(1),
                ops,
            }
            .encode()
            .unwrap(),
        );
        data
    }

    fn put<T: Entity>(value: &T) -> Op {
        Op::Put {
            entity_type: T::TYPE_NAME.to_string(),
            key: value.primary_key(),
            record: value.to_record(),
        }
    }

    #[test]
    fn current_store_passes() {
        let data = image(
            TARGET_SCHEMA_VERSION,
            vec![
                put(&User::new(1, "a@favor.app", "a", "A")),
                put(&Gift::new(2, "candle", "birthday")),
            ],
        );
        let result = verify(data).unwrap();
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.records_checked, 2);
    }

    #[test]
    fn undecodable_record_fails() {
        let data = image(
            TARGET_SCHEMA_VERSION,
            vec![Op::Put {
                entity_type: Gift::TYPE_NAME.to_string(),
                key: PrimaryKey::new(7),
                record: Record::new().with("name", "no category"),
            }],
        );
        let result = verify(data).unwrap();
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("Gift #7"), "{:?}", result.errors);
    }

    #[test]
    fn old_store_is_checked_through_migration() {
        let data = image(
            3,
            vec![Op::Put {
                entity_type: RecentSearch::TYPE_NAME.to_string(),
                key: PrimaryKey::new(1),
                record: Record::new().with("search_text", "candle"),
            }],
        );
        let result = verify(data).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }
}
