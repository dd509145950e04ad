//! Mapping lookup and resolution.
//!
//! # Responsibilities
//! - Compile `MappingConfig` entries (patterns, methods, templates, transforms)
//! - Find the first mapping matching an inbound request
//! - Render the target templates into a `RequestMapping`
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Compilation reports every error, not just the first
//! - Explicit no-match (`Ok(None)`) rather than a silent default

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, Method};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::config::schema::MappingConfig;
use crate::mapping::{
    CachingPolicy, MappingError, MappingFlags, PathPattern, RequestMapping,
};
use crate::transform::{CompiledTransform, Templates};

const URI: &str = "uri";
const BODY: &str = "body";
const CACHE_KEY: &str = "cache_key";

fn header_template(name: &str) -> String {
    format!("header:{}", name)
}

/// The parts of an inbound request a mapping is resolved from.
#[derive(Debug)]
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
struct CompiledMapping {
    name: String,
    method: Option<Method>,
    pattern: PathPattern,
    priority: u32,
    target_method: Option<Method>,
    header_names: Vec<String>,
    has_body: bool,
    caching: Option<CachingPolicy>,
    transform: Option<Arc<CompiledTransform>>,
    templates: Templates,
}

impl CompiledMapping {
    fn compile(config: &MappingConfig) -> Result<Self, Vec<MappingError>> {
        let mut errors = Vec::new();
        let name = config.name.clone();

        let pattern = PathPattern::parse(&config.path)
            .map_err(|reason| errors.push(MappingError::Pattern { mapping: name.clone(), reason }))
            .ok();
        let method = parse_method(&name, config.method.as_deref(), &mut errors);
        let target_method = parse_method(&name, config.target.method.as_deref(), &mut errors);

        let mut templates = Templates::new();
        let mut add = |field: String, source: &str, errors: &mut Vec<MappingError>| {
            if let Err(source) = templates.add(&field, source) {
                errors.push(MappingError::Template { mapping: name.clone(), field, source });
            }
        };

        add(URI.to_string(), &config.target.uri, &mut errors);
        for (header, value) in &config.target.headers {
            if HeaderName::from_bytes(header.as_bytes()).is_err() {
                errors.push(MappingError::HeaderName { mapping: name.clone(), name: header.clone() });
                continue;
            }
            add(header_template(header), value, &mut errors);
        }
        if let Some(body) = &config.target.body {
            add(BODY.to_string(), body, &mut errors);
        }
        if let Some(caching) = &config.caching {
            add(CACHE_KEY.to_string(), &caching.key, &mut errors);
        }

        let transform = match &config.target.transform {
            Some(t) => match CompiledTransform::compile(t) {
                Ok(compiled) => Some(Arc::new(compiled)),
                Err(source) => {
                    errors.push(MappingError::Transform { mapping: name.clone(), source });
                    None
                }
            },
            None => None,
        };

        match pattern {
            Some(pattern) if errors.is_empty() => Ok(Self {
                name,
                method,
                pattern,
                priority: config.priority,
                target_method,
                header_names: config.target.headers.keys().cloned().collect(),
                has_body: config.target.body.is_some(),
                caching: config.caching.as_ref().map(|c| CachingPolicy { ttl_secs: c.seconds }),
                transform,
                templates,
            }),
            _ => Err(errors),
        }
    }

    fn render(&self, field: &str, data: &Map<String, Value>) -> Result<String, MappingError> {
        self.templates.render(field, data).map_err(|source| MappingError::Render {
            mapping: self.name.clone(),
            field: field.to_string(),
            source,
        })
    }
}

fn parse_method(mapping: &str, value: Option<&str>, errors: &mut Vec<MappingError>) -> Option<Method> {
    let value = value?;
    match Method::from_bytes(value.to_ascii_uppercase().as_bytes()) {
        Ok(method) => Some(method),
        Err(_) => {
            errors.push(MappingError::Method { mapping: mapping.to_string(), value: value.to_string() });
            None
        }
    }
}

/// Compiled, priority-ordered set of mappings.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: Vec<CompiledMapping>,
}

impl MappingTable {
    /// Compile all mappings. On failure returns every error found.
    pub fn from_config(configs: &[MappingConfig]) -> Result<Self, Vec<MappingError>> {
        let mut entries = Vec::with_capacity(configs.len());
        let mut errors = Vec::new();

        for config in configs {
            match CompiledMapping::compile(config) {
                Ok(entry) => entries.push(entry),
                Err(mut errs) => errors.append(&mut errs),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // Stable sort keeps file order within a priority.
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an inbound request into a `RequestMapping`. `Ok(None)` when nothing matches.
    pub fn resolve(&self, request: InboundRequest<'_>) -> Result<Option<RequestMapping>, MappingError> {
        let Some((entry, captures)) = self.entries.iter().find_map(|entry| {
            if entry.method.as_ref().is_some_and(|m| m != request.method) {
                return None;
            }
            entry.pattern.matches(request.path).map(|captures| (entry, captures))
        }) else {
            return Ok(None);
        };

        let data = data_bag(&request, captures);

        let uri = entry.render(URI, &data)?;
        let mut headers = Vec::with_capacity(entry.header_names.len());
        for name in &entry.header_names {
            headers.push((name.clone(), entry.render(&header_template(name), &data)?));
        }
        let body = if entry.has_body {
            Bytes::from(entry.render(BODY, &data)?)
        } else {
            request.body.clone()
        };
        let cache_key = match entry.caching {
            Some(_) => Some(entry.render(CACHE_KEY, &data)?),
            None => None,
        };

        Ok(Some(RequestMapping {
            name: entry.name.clone(),
            verb: entry.target_method.clone().unwrap_or_else(|| request.method.clone()),
            uri,
            headers,
            body,
            flags: MappingFlags::from_data(&data),
            data,
            cache_key,
            transform: entry.transform.clone(),
            caching: entry.caching.unwrap_or_default(),
        }))
    }
}

/// Build the data bag: `method`, `path` captures, `query` (first value wins), `headers`.
fn data_bag(request: &InboundRequest<'_>, captures: Map<String, Value>) -> Map<String, Value> {
    let mut query = Map::new();
    if let Some(raw) = request.query {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query
                .entry(key.into_owned())
                .or_insert_with(|| Value::String(value.into_owned()));
        }
    }

    let mut headers = Map::new();
    for (name, value) in request.headers {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| Value::String(value.to_string()));
        }
    }

    let mut data = Map::new();
    data.insert("method".to_string(), Value::String(request.method.to_string()));
    data.insert("path".to_string(), Value::Object(captures));
    data.insert("query".to_string(), Value::Object(query));
    data.insert("headers".to_string(), Value::Object(headers));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CachingConfig, TargetConfig, TransformConfig};
    use std::collections::BTreeMap;

    fn mapping(name: &str, path: &str, uri: &str) -> MappingConfig {
        MappingConfig {
            name: name.to_string(),
            method: None,
            path: path.to_string(),
            priority: 0,
            target: TargetConfig {
                method: None,
                uri: uri.to_string(),
                headers: BTreeMap::new(),
                body: None,
                transform: None,
            },
            caching: None,
        }
    }

    fn resolve(
        table: &MappingTable,
        method: Method,
        path: &str,
        query: Option<&str>,
    ) -> Option<RequestMapping> {
        let headers = HeaderMap::new();
        table
            .resolve(InboundRequest {
                method: &method,
                path,
                query,
                headers: &headers,
                body: Bytes::from_static(b"inbound"),
            })
            .unwrap()
    }

    #[test]
    fn test_resolve_templates() {
        let mut config = mapping("orders", "/orders/{id}", "http://up/api/orders/{{path.id}}?lang={{query.lang}}");
        config.target.headers.insert("Accept".into(), "application/json".into());
        config.target.headers.insert("X-Method".into(), "{{method}}".into());
        config.caching = Some(CachingConfig { key: "order-{{path.id}}".into(), seconds: 30 });

        let table = MappingTable::from_config(&[config]).unwrap();
        let resolved = resolve(&table, Method::GET, "/orders/42", Some("lang=en&lang=fr")).unwrap();

        assert_eq!(resolved.name, "orders");
        assert_eq!(resolved.verb, Method::GET);
        assert_eq!(resolved.uri, "http://up/api/orders/42?lang=en");
        assert_eq!(
            resolved.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Method".to_string(), "GET".to_string()),
            ]
        );
        assert_eq!(resolved.body, Bytes::from_static(b"inbound"));
        assert_eq!(resolved.cache_key.as_deref(), Some("order-42"));
        assert_eq!(resolved.caching.ttl_secs, 30);
        assert_eq!(resolved.data["query"]["lang"], "en");
    }

    #[test]
    fn test_flags_from_query() {
        let mut config = mapping("m", "/x", "http://up/x");
        config.caching = Some(CachingConfig { key: "x".into(), seconds: 30 });
        let table = MappingTable::from_config(&[config]).unwrap();

        let resolved = resolve(&table, Method::GET, "/x", Some("_nocache&_notransform=1")).unwrap();
        assert!(resolved.flags.suppress_cache);
        assert!(resolved.flags.suppress_transform);
        assert_eq!(resolved.effective_cache_key(), None);
    }

    #[test]
    fn test_body_template_and_target_method() {
        let mut config = mapping("m", "/search/{term}", "http://up/search");
        config.target.method = Some("post".into());
        config.target.body = Some(r#"{"q":"{{path.term}}"}"#.into());
        let table = MappingTable::from_config(&[config]).unwrap();

        let resolved = resolve(&table, Method::GET, "/search/rust", None).unwrap();
        assert_eq!(resolved.verb, Method::POST);
        assert_eq!(resolved.body, Bytes::from_static(br#"{"q":"rust"}"#));
        assert!(resolved.cache_key.is_none());
    }

    #[test]
    fn test_priority_and_method_filter() {
        let mut post_only = mapping("post-only", "/items/{id}", "http://up/post");
        post_only.method = Some("POST".into());
        post_only.priority = 10;
        let generic = mapping("generic", "/items/{id}", "http://up/generic");
        let mut specific = mapping("specific", "/items/special", "http://up/special");
        specific.priority = 5;

        let table = MappingTable::from_config(&[generic, post_only, specific]).unwrap();
        assert_eq!(table.len(), 3);

        assert_eq!(resolve(&table, Method::GET, "/items/1", None).unwrap().name, "generic");
        assert_eq!(resolve(&table, Method::POST, "/items/1", None).unwrap().name, "post-only");
        assert_eq!(resolve(&table, Method::GET, "/items/special", None).unwrap().name, "specific");
        assert!(resolve(&table, Method::GET, "/nothing", None).is_none());
    }

    #[test]
    fn test_transform_attached() {
        let mut config = mapping("m", "/x", "http://up/x");
        config.target.transform = Some(TransformConfig {
            kind: "json".into(),
            pattern: None,
            template: "{{data.a}}".into(),
        });
        let table = MappingTable::from_config(&[config]).unwrap();
        let resolved = resolve(&table, Method::GET, "/x", None).unwrap();
        assert_eq!(resolved.transform.unwrap().extraction().kind(), "json");
    }

    #[test]
    fn test_compile_collects_all_errors() {
        let mut bad = mapping("bad", "no-slash", "{{#if}}");
        bad.method = Some("NOT A METHOD".into());
        bad.target.headers.insert("bad header".into(), "v".into());
        bad.target.transform = Some(TransformConfig {
            kind: "regexp".into(),
            pattern: None,
            template: "x".into(),
        });

        let errors = MappingTable::from_config(&[bad, mapping("ok", "/ok", "http://up")]).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().all(|e| e.to_string().starts_with("mapping 'bad'")));
    }

    #[test]
    fn test_render_error_surfaces() {
        let config = mapping("m", "/x", "{{nohelper path}}");
        let table = MappingTable::from_config(&[config]).unwrap();
        let headers = HeaderMap::new();
        let err = table
            .resolve(InboundRequest {
                method: &Method::GET,
                path: "/x",
                query: None,
                headers: &headers,
                body: Bytes::new(),
            })
            .unwrap_err();
        assert!(matches!(err, MappingError::Render { .. }));
    }
}
