//! File URIs and jump-target extraction
//!
//! Converts between filesystem paths and `file://` URIs, and decodes the
//! `result` of a definition/references response into locations. Servers
//! answer with one of three shapes (a single Location, a Location array,
//! or a LocationLink array); all are folded into `Vec<lsp_types::Location>`.

use crate::rpc::RpcError;
use lsp_types::{Location, Position, Range, Uri};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

/// Convert a file path to a `file://` URI.
pub fn path_to_uri(path: &Path) -> Result<Uri, RpcError> {
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| RpcError::InvalidPath(format!("cannot resolve relative path: {}", e)))?
            .join(path)
    };

    let path_str = abs_path
        .to_str()
        .ok_or_else(|| RpcError::InvalidPath("Path contains invalid UTF-8".to_string()))?;

    let uri_string = if cfg!(windows) {
        format!("file:///{}", path_str.replace('\\', "/"))
    } else {
        format!("file://{}", path_str)
    };

    Uri::from_str(&uri_string).map_err(|e| RpcError::InvalidPath(format!("Invalid URI: {}", e)))
}

/// Extract the path from a `file://` URI.
pub fn uri_to_path(uri: &Uri) -> String {
    let s = uri.as_str();
    if let Some(path) = s.strip_prefix("file://") {
        // Windows paths arrive as file:///C:/...
        if path.starts_with('/') && path.len() > 2 && path.chars().nth(2) == Some(':') {
            path[1..].to_string()
        } else {
            path.to_string()
        }
    } else {
        s.to_string()
    }
}

/// `path:line:column`, 1-based, for display.
pub fn format_location(location: &Location) -> String {
    format!(
        "{}:{}:{}",
        uri_to_path(&location.uri),
        location.range.start.line + 1,
        location.range.start.character + 1
    )
}

// Wire shapes. Some servers omit `range.end`, so the decode only insists
// on `uri` and `range.start`, like the fields actually consumed.
#[derive(Deserialize)]
struct WireLocation {
    uri: String,
    range: WireRange,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLocationLink {
    target_uri: String,
    target_selection_range: WireRange,
}

#[derive(Deserialize)]
struct WireRange {
    start: WirePosition,
    #[serde(default)]
    end: Option<WirePosition>,
}

#[derive(Deserialize, Clone, Copy)]
struct WirePosition {
    line: u32,
    character: u32,
}

fn to_location(uri: &str, range: &WireRange) -> Option<Location> {
    let uri = Uri::from_str(uri).ok()?;
    let start = Position {
        line: range.start.line,
        character: range.start.character,
    };
    let end = range
        .end
        .map(|p| Position {
            line: p.line,
            character: p.character,
        })
        .unwrap_or(start);
    Some(Location {
        uri,
        range: Range { start, end },
    })
}

/// Decode the `result` field of a definition/references response.
/// Elements that fail to decode are skipped; order is preserved.
pub fn locations_from_result(result: &Value) -> Vec<Location> {
    if result.is_null() {
        return Vec::new();
    }
    if let Ok(locations) = serde_json::from_value::<Vec<WireLocation>>(result.clone()) {
        return locations
            .iter()
            .filter_map(|l| to_location(&l.uri, &l.range))
            .collect();
    }
    if let Ok(location) = serde_json::from_value::<WireLocation>(result.clone()) {
        return to_location(&location.uri, &location.range)
            .into_iter()
            .collect();
    }
    if let Ok(links) = serde_json::from_value::<Vec<WireLocationLink>>(result.clone()) {
        return links
            .iter()
            .filter_map(|l| to_location(&l.target_uri, &l.target_selection_range))
            .collect();
    }
    Vec::new()
}

/// Decode the locations of a full JSON-RPC response payload.
pub fn locations_from_response(response: &Value) -> Vec<Location> {
    response
        .get("result")
        .map(locations_from_result)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_path_to_uri() {
        let path = PathBuf::from("/home/user/project/main.c");
        let uri = path_to_uri(&path).unwrap();
        assert_eq!(uri.as_str(), "file:///home/user/project/main.c");
    }

    #[test]
    fn test_uri_to_path_round_trip() {
        let uri = path_to_uri(Path::new("/tmp/a.c")).unwrap();
        assert_eq!(uri_to_path(&uri), "/tmp/a.c");
    }

    #[test]
    fn test_location_array_start_only_range() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": [
                {"uri": "file:///a.c", "range": {"start": {"line": 4, "character": 2}}}
            ]
        });
        let locations = locations_from_response(&response);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri.as_str(), "file:///a.c");
        assert_eq!(locations[0].range.start.line, 4);
        assert_eq!(locations[0].range.start.character, 2);
        assert_eq!(locations[0].range.end.line, 4);
    }

    #[test]
    fn test_single_location_object() {
        let result = json!(
            {"uri": "file:///b.c", "range": {"start": {"line": 1, "character": 0},
                                             "end": {"line": 1, "character": 5}}}
        );
        let locations = locations_from_result(&result);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].range.end.character, 5);
    }

    #[test]
    fn test_location_link_array() {
        let result = json!([
            {
                "targetUri": "file:///c.c",
                "targetRange": {"start": {"line": 0, "character": 0},
                                "end": {"line": 9, "character": 0}},
                "targetSelectionRange": {"start": {"line": 2, "character": 4},
                                         "end": {"line": 2, "character": 10}}
            }
        ]);
        let locations = locations_from_result(&result);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri.as_str(), "file:///c.c");
        assert_eq!(locations[0].range.start.line, 2);
        assert_eq!(locations[0].range.start.character, 4);
    }

    #[test]
    fn test_references_preserve_order() {
        let result = json!([
            {"uri": "file:///a.c", "range": {"start": {"line": 4, "character": 2}}},
            {"uri": "file:///b.c", "range": {"start": {"line": 10, "character": 0}}}
        ]);
        let locations = locations_from_result(&result);
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].uri.as_str(), "file:///a.c");
        assert_eq!(locations[1].uri.as_str(), "file:///b.c");
        assert_eq!(locations[1].range.start.line, 10);
    }

    #[test]
    fn test_null_and_missing_results_are_empty() {
        assert!(locations_from_result(&Value::Null).is_empty());
        assert!(locations_from_response(&json!({"jsonrpc": "2.0", "id": 1})).is_empty());
        assert!(locations_from_result(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_format_location_is_one_based() {
        let result = json!(
            {"uri": "file:///src/lib.rs", "range": {"start": {"line": 4, "character": 2}}}
        );
        let location = &locations_from_result(&result)[0];
        assert_eq!(format_location(location), "/src/lib.rs:5:3");
    }
}
