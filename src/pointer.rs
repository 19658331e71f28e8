//! RFC 6901 JSON Pointer helpers shared by the compiler and the live tree.

use serde_json::Value;

/// Split a pointer into unescaped segments.
///
/// Accepts both plain pointers (`/a/b`) and fragments (`#/a/b`). Only the
/// empty pointer and `#` address the root; `/` is the empty key.
pub fn segments(pointer: &str) -> Vec<String> {
    let path = pointer.strip_prefix('#').unwrap_or(pointer);
    if path.is_empty() {
        return Vec::new();
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    // ~1 before ~0, so "~01" decodes to "~1"
    path.split('/')
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Escape a single segment for inclusion in a pointer.
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Append a segment to a pointer.
pub fn child(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, escape(segment))
}

/// Navigate a JSON Pointer fragment (e.g. `#/$defs/foo`) within `root`.
pub fn navigate_fragment<'a>(root: &'a Value, fragment: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in segments(fragment) {
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_pointers() {
        assert!(segments("").is_empty());
        assert!(segments("#").is_empty());
    }

    #[test]
    fn empty_keys_are_kept() {
        assert_eq!(segments("/"), [""]);
        assert_eq!(segments("//x"), ["", "x"]);
        assert_eq!(segments("#/"), [""]);
        assert_eq!(segments("##/a"), ["#", "a"]);
    }

    #[test]
    fn unescapes_segments() {
        assert_eq!(segments("/paths/~1pets~1{id}"), ["paths", "/pets/{id}"]);
        assert_eq!(segments("#/a~0b"), ["a~b"]);
        assert_eq!(segments("/~01"), ["~1"]);
    }

    #[test]
    fn escape_round_trips() {
        let pointer = child("/paths", "/pets/{id}");
        assert_eq!(pointer, "/paths/~1pets~1{id}");
        assert_eq!(segments(&pointer), ["paths", "/pets/{id}"]);
    }

    #[test]
    fn navigates_objects_and_arrays() {
        let doc = json!({"$defs": {"tags": ["a", "b"]}});
        assert_eq!(navigate_fragment(&doc, "#/$defs/tags/1"), Some(&json!("b")));
        assert_eq!(navigate_fragment(&doc, "#"), Some(&doc));
        assert_eq!(navigate_fragment(&doc, "#/$defs/missing"), None);
        assert_eq!(navigate_fragment(&doc, "#/$defs/tags/x"), None);
    }
}
