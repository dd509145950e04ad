//! Path pattern matching.
//!
//! # Responsibilities
//! - Match literal segments (case-sensitive)
//! - Capture `{name}` segments
//! - Capture a trailing `{*name}` tail (zero or more segments)
//!
//! # Design Decisions
//! - Empty segments are ignored, so `/a//b/` matches `/a/b`
//! - No regex in the hot path: segment-by-segment comparison

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
    Tail(String),
}

/// A compiled inbound path pattern such as `/orders/{id}`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern. Returns a reason string on malformed input.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if !pattern.starts_with('/') {
            return Err(format!("pattern '{}' must start with '/'", pattern));
        }

        let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (i, part) in raw.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) if name.starts_with('*') => {
                    if i + 1 != raw.len() {
                        return Err(format!("tail capture '{}' must be the last segment", part));
                    }
                    Segment::Tail(valid_name(&name[1..], part)?)
                }
                Some(name) => Segment::Capture(valid_name(name, part)?),
                None if part.contains('{') || part.contains('}') => {
                    return Err(format!("malformed segment '{}'", part));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Match `path`, returning the captured values by name.
    pub fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = Map::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    let value = parts.get(i)?;
                    captures.insert(name.clone(), Value::String(value.to_string()));
                }
                Segment::Tail(name) => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    captures.insert(name.clone(), Value::String(rest));
                    return Some(captures);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }
}

fn valid_name(name: &str, part: &str) -> Result<String, String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid capture name in segment '{}'", part));
    }
    Ok(name.to_string())
}
