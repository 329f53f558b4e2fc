use serde_json::{Map, Value};
use tracing::debug;

use graft_types::{keys, Payload, Record, Timestamp, Version};

use crate::select::select_current;

/// Outcome of folding one version into a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Absorbed {
    /// The version was appended to the field's history.
    Appended,
    /// An identical version was already present; nothing changed.
    Duplicate,
}

/// Merge `source` into `target`: per field, histories are concatenated.
///
/// This is the record-shaped case of [`crate::merge_values`]: both sides
/// are maps of lists, so maps merge key-wise and lists append.
pub fn merge_records(target: &mut Record, source: Record) {
    for (field, versions) in source {
        target.history_mut(&field).extend(versions);
    }
}

/// Append `version` to `field`'s history unless the exact same version is
/// already recorded.
pub fn absorb(record: &mut Record, field: &str, version: Version) -> Absorbed {
    if record.versions(field).contains(&version) {
        debug!(field, timestamp = version.timestamp, "version already recorded");
        return Absorbed::Duplicate;
    }
    merge_records(record, Record::single(field, version));
    Absorbed::Appended
}

/// One current version per field. Fields with only pending versions are left out.
pub fn materialize(record: &Record, now: Timestamp) -> Record {
    record
        .fields()
        .filter_map(|(field, versions)| {
            select_current(versions, now).map(|v| (field.to_owned(), vec![v.clone()]))
        })
        .collect()
}

/// The plain value a version stands for: the scalar itself, or `{"#": target}`
/// for references.
pub fn resolved_value(version: &Version) -> Value {
    match &version.payload {
        Payload::Value(value) => value.clone(),
        Payload::Ref(target) => {
            let mut link = Map::new();
            link.insert(keys::SUBJECT.into(), Value::String(target.clone()));
            Value::Object(link)
        }
    }
}

/// Decode a record into plain field values using current-version selection.
pub fn decode_fields(record: &Record, now: Timestamp) -> Map<String, Value> {
    record
        .fields()
        .filter_map(|(field, versions)| {
            select_current(versions, now).map(|v| (field.to_owned(), resolved_value(v)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absorb_appends_never_replaces() {
        let mut record = Record::single("username", Version::value(1, json!("admin")));
        let outcome = absorb(&mut record, "username", Version::value(2, json!("root")));
        assert_eq!(outcome, Absorbed::Appended);
        assert_eq!(record.versions("username").len(), 2);
        assert_eq!(record.versions("username")[0], Version::value(1, json!("admin")));
    }

    #[test]
    fn history_grows_by_one_per_distinct_write() {
        let mut record = Record::new();
        for ts in 1..=5 {
            absorb(&mut record, "n", Version::value(ts, json!(ts)));
            assert_eq!(record.versions("n").len() as u64, ts);
        }
    }

    #[test]
    fn identical_version_is_a_duplicate() {
        let mut record = Record::single("a", Version::value(5, json!(1)));
        assert_eq!(absorb(&mut record, "a", Version::value(5, json!(1))), Absorbed::Duplicate);
        assert_eq!(record.versions("a").len(), 1);
        // Same timestamp, different payload is a new version.
        assert_eq!(absorb(&mut record, "a", Version::value(5, json!(2))), Absorbed::Appended);
    }

    #[test]
    fn merge_records_adds_new_fields() {
        let mut target = Record::single("a", Version::value(1, json!(1)));
        merge_records(&mut target, Record::single("b", Version::reference(2, "x/b")));
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn materialize_keeps_current_only() {
        let mut record = Record::single("username", Version::value(1, json!("admin")));
        absorb(&mut record, "username", Version::value(3, json!("root")));
        absorb(&mut record, "later", Version::value(99, json!("pending")));
        let view = materialize(&record, 10);
        assert_eq!(view.versions("username"), &[Version::value(3, json!("root"))]);
        assert!(!view.contains("later"));
    }

    #[test]
    fn decode_fields_renders_references() {
        let mut record = Record::single("username", Version::value(1, json!("admin")));
        absorb(&mut record, "options", Version::reference(1, "account/admin/options"));
        let fields = decode_fields(&record, 5);
        assert_eq!(
            Value::Object(fields),
            json!({"username": "admin", "options": {"#": "account/admin/options"}})
        );
    }
}
