//! Link Collector Module
//!
//! Pulls image URLs out of an arbitrary JSON document payload.

use std::collections::HashSet;

use serde_json::Value;

/// Attribute that carries an image URL in document payloads.
pub const LINK_ATTRIBUTE: &str = "link";

/// Nesting depth beyond which the walk stops descending.
pub const MAX_DEPTH: usize = 128;

// == Collect Links ==
/// Every distinct `http(s)://` string found under a `link` key, at any depth.
pub fn collect_links(payload: &Value) -> HashSet<String> {
    let mut links = HashSet::new();
    walk(payload, 0, &mut links);
    links
}

fn walk(value: &Value, depth: usize, links: &mut HashSet<String>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, links);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(link)) = map.get(LINK_ATTRIBUTE) {
                if is_http_url(link) {
                    links.insert(link.clone());
                }
            }
            for child in map.values() {
                walk(child, depth + 1, links);
            }
        }
        _ => {}
    }
}

// == Is Http Url ==
/// Case-insensitive `http://` or `https://` prefix.
pub fn is_http_url(candidate: &str) -> bool {
    let has_prefix = |prefix: &str| {
        candidate
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    has_prefix("http://") || has_prefix("https://")
}
