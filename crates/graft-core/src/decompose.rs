use serde_json::{Map, Value};

use graft_types::{keys, Envelope, Path, Timestamp};

/// A JSON object whose only key is `#` holding a path string marks a
/// reference to that path.
pub(crate) fn link_target(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(keys::SUBJECT)?.as_str(),
        _ => None,
    }
}

/// Flatten `value` at `path` into elementary writes, depth first.
///
/// Nested objects and arrays become a reference edge from their path to
/// itself followed by their own children; scalars become scalar writes;
/// link markers become reference writes to their target.
pub(crate) fn decompose(
    path: &Path,
    value: &Value,
    now: Timestamp,
    separator: &str,
) -> Vec<Envelope> {
    let mut out = Vec::new();
    match value {
        Value::Object(map) => children(path, map, now, separator, &mut out),
        Value::Array(items) => items_of(path, items, now, separator, &mut out),
        scalar => out.push(Envelope::scalar(path.join(separator), now, scalar.clone())),
    }
    out
}

fn children(
    path: &Path,
    map: &Map<String, Value>,
    now: Timestamp,
    separator: &str,
    out: &mut Vec<Envelope>,
) {
    for (key, child) in map {
        walk(&path.child(key.as_str()), child, now, separator, out);
    }
}

fn items_of(path: &Path, items: &[Value], now: Timestamp, separator: &str, out: &mut Vec<Envelope>) {
    for (index, child) in items.iter().enumerate() {
        walk(&path.child(index.to_string()), child, now, separator, out);
    }
}

fn walk(path: &Path, value: &Value, now: Timestamp, separator: &str, out: &mut Vec<Envelope>) {
    let here = path.join(separator);
    if let Some(target) = link_target(value) {
        out.push(Envelope::reference(here, now, target));
        return;
    }
    match value {
        Value::Object(map) => {
            out.push(Envelope::reference(here.clone(), now, here));
            children(path, map, now, separator, out);
        }
        Value::Array(items) => {
            out.push(Envelope::reference(here.clone(), now, here));
            items_of(path, items, now, separator, out);
        }
        scalar => out.push(Envelope::scalar(here, now, scalar.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(path: &str) -> Path {
        Path::parse(path, "/")
    }

    #[test]
    fn nested_object_yields_edges_and_leaves() {
        let writes = decompose(&at("X"), &json!({"a": 1, "b": {"c": 2}}), 9, "/");
        assert_eq!(
            writes,
            vec![
                Envelope::scalar("X/a", 9, json!(1)),
                Envelope::reference("X/b", 9, "X/b"),
                Envelope::scalar("X/b/c", 9, json!(2)),
            ]
        );
    }

    #[test]
    fn arrays_use_index_segments() {
        let writes = decompose(&at("list"), &json!({"tags": ["x", "y"]}), 1, "/");
        assert_eq!(
            writes,
            vec![
                Envelope::reference("list/tags", 1, "list/tags"),
                Envelope::scalar("list/tags/0", 1, json!("x")),
                Envelope::scalar("list/tags/1", 1, json!("y")),
            ]
        );
    }

    #[test]
    fn scalar_and_null_are_single_writes() {
        assert_eq!(
            decompose(&at("a/b"), &json!(null), 3, "/"),
            vec![Envelope::scalar("a/b", 3, json!(null))]
        );
    }

    #[test]
    fn nested_link_marker_becomes_reference() {
        let writes = decompose(&at("users"), &json!({"marco": {"#": "account/admin"}}), 4, "/");
        assert_eq!(writes, vec![Envelope::reference("users/marco", 4, "account/admin")]);
    }

    #[test]
    fn link_target_requires_lone_string_key() {
        assert_eq!(link_target(&json!({"#": "a/b"})), Some("a/b"));
        assert_eq!(link_target(&json!({"#": "a/b", "x": 1})), None);
        assert_eq!(link_target(&json!({"#": 5})), None);
        assert_eq!(link_target(&json!("a/b")), None);
    }

    #[test]
    fn empty_object_yields_nothing() {
        assert!(decompose(&at("a/b"), &json!({}), 1, "/").is_empty());
    }

    #[test]
    fn custom_separator_is_used() {
        let writes = decompose(&Path::parse("a.b", "."), &json!({"c": true}), 1, ".");
        assert_eq!(writes, vec![Envelope::scalar("a.b.c", 1, json!(true))]);
    }
}
