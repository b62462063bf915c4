//! Read-only typed projection of an OpenAPI 3.x / Swagger 2.0 document.
//!
//! Specs in the wild are loosely shaped, so every field is optional and every element is
//! projected independently: a malformed operation or schema is skipped, never fatal. Map order
//! from the source document is kept (paths, responses, properties, schemas).

use docsift_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

const MAX_SCHEMA_DEPTH: usize = 6;
const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// A fetched spec body before projection. YAML is parsed lazily.
#[derive(Debug, Clone)]
pub enum RawSpec {
    Structured(Value),
    RawYaml(String),
}

impl RawSpec {
    /// Accept a body as-is if it is already JSON, else keep it for a YAML parse.
    pub fn from_text(body: &str) -> Self {
        match serde_json::from_str::<Value>(body.trim()) {
            Ok(v) => RawSpec::Structured(v),
            Err(_) => RawSpec::RawYaml(body.to_string()),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            RawSpec::Structured(v) => Ok(v),
            RawSpec::RawYaml(s) => serde_yaml::from_str::<Value>(&s)
                .map_err(|e| Error::Parse(format!("spec is neither JSON nor YAML: {e}"))),
        }
    }
}

/// `openapi: 3.x`, `swagger: 2.x`, or any of the structural top-level keys.
pub fn is_valid_spec(v: &Value) -> bool {
    let Some(obj) = v.as_object() else {
        return false;
    };
    if obj
        .get("openapi")
        .and_then(Value::as_str)
        .is_some_and(|s| s.starts_with("3."))
    {
        return true;
    }
    if obj
        .get("swagger")
        .and_then(Value::as_str)
        .is_some_and(|s| s.starts_with("2."))
    {
        return true;
    }
    ["paths", "info", "components", "definitions"]
        .iter()
        .any(|k| obj.contains_key(*k))
}

// Each field is read on its own: a number where a string is expected (`version: 1.0` in YAML)
// is kept as text, and any other mistyped field becomes `None` without losing its siblings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Info {
    #[serde(deserialize_with = "loose_str")]
    pub title: Option<String>,
    #[serde(deserialize_with = "loose_str")]
    pub version: Option<String>,
    #[serde(deserialize_with = "loose_str")]
    pub description: Option<String>,
    #[serde(deserialize_with = "loose")]
    pub contact: Option<Contact>,
    #[serde(deserialize_with = "loose")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(deserialize_with = "loose_str")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_str")]
    pub email: Option<String>,
    #[serde(deserialize_with = "loose_str")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct License {
    #[serde(deserialize_with = "loose_str")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_str")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    #[serde(deserialize_with = "loose_string")]
    pub url: String,
    #[serde(deserialize_with = "loose_str")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tag {
    #[serde(deserialize_with = "loose_string")]
    pub name: String,
    #[serde(deserialize_with = "loose_str")]
    pub description: Option<String>,
}

fn loose_str<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(scalar_text(&Value::deserialize(d)?))
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(scalar_text(&Value::deserialize(d)?).unwrap_or_default())
}

fn loose<'de, D, T>(d: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

/// Strings as-is; numbers and booleans in their JSON spelling.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Parameter {
    pub name: String,
    pub location: Option<String>,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub description: Option<String>,
    pub required: bool,
    /// Media type and its schema, in document order.
    pub content: Vec<(String, Option<Schema>)>,
}

#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub method: String,
    pub path: String,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
    /// Path-level parameters merged with operation-level ones (operation wins on name+location).
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Status code and description.
    pub responses: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub ty: Option<String>,
    pub format: Option<String>,
    /// Name of the referenced model for `$ref` schemas.
    pub reference: Option<String>,
    pub description: Option<String>,
    pub items: Option<Box<Schema>>,
    pub properties: Vec<(String, Schema)>,
    pub required: Vec<String>,
    pub enum_values: Vec<String>,
    /// `allOf` / `oneOf` / `anyOf` and their members.
    pub composition: Option<(&'static str, Vec<Schema>)>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiSpec {
    /// `openapi` or `swagger` version string.
    pub spec_version: Option<String>,
    pub info: Info,
    pub servers: Vec<Server>,
    pub tags: Vec<Tag>,
    pub operations: Vec<Operation>,
    pub schemas: Vec<(String, Schema)>,
}

impl ApiSpec {
    pub fn from_value(root: &Value) -> Self {
        let spec_version = str_field(root, "openapi").or_else(|| str_field(root, "swagger"));
        let info = root
            .get("info")
            .and_then(|v| lenient::<Info>(v, "info"))
            .unwrap_or_default();
        let tags = root
            .get("tags")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|t| lenient::<Tag>(t, "tag")).collect())
            .unwrap_or_default();
        let schemas = root
            .pointer("/components/schemas")
            .or_else(|| root.get("definitions"))
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(name, s)| (name.clone(), Schema::from_value(s, 0)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            spec_version,
            info,
            servers: servers(root),
            tags,
            operations: operations(root),
            schemas,
        }
    }
}

fn lenient<T: for<'de> Deserialize<'de>>(v: &Value, what: &str) -> Option<T> {
    match serde_json::from_value::<T>(v.clone()) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::debug!(what, error = %e, "skipping malformed spec element");
            None
        }
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(scalar_text)
}

fn non_empty_str(v: &Value, key: &str) -> Option<String> {
    str_field(v, key).filter(|s| !s.trim().is_empty())
}

/// OpenAPI 3 `servers`, or Swagger 2 `schemes` + `host` + `basePath`.
fn servers(root: &Value) -> Vec<Server> {
    if let Some(list) = root.get("servers").and_then(Value::as_array) {
        return list
            .iter()
            .filter_map(|s| lenient::<Server>(s, "server"))
            .filter(|s| !s.url.is_empty())
            .collect();
    }
    let host = non_empty_str(root, "host");
    let base = non_empty_str(root, "basePath").unwrap_or_default();
    let Some(host) = host else {
        return if base.is_empty() {
            Vec::new()
        } else {
            vec![Server {
                url: base,
                description: None,
            }]
        };
    };
    let schemes: Vec<String> = root
        .get("schemes")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .filter(|v: &Vec<String>| !v.is_empty())
        .unwrap_or_else(|| vec!["https".to_string()]);
    schemes
        .into_iter()
        .map(|scheme| Server {
            url: format!("{scheme}://{host}{base}"),
            description: None,
        })
        .collect()
}

fn operations(root: &Value) -> Vec<Operation> {
    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let global_consumes = string_list(root.get("consumes"));
    let mut out = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        let path_params = parameters(root, item.get("parameters"));
        for (method, op) in item {
            if !HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                continue;
            }
            let Some(op) = op.as_object() else {
                tracing::debug!(%path, %method, "skipping malformed operation");
                continue;
            };
            out.push(operation(root, path, method, op, &path_params, &global_consumes));
        }
    }
    out
}

fn operation(
    root: &Value,
    path: &str,
    method: &str,
    op: &Map<String, Value>,
    path_params: &[Parameter],
    global_consumes: &[String],
) -> Operation {
    let op_value = Value::Object(op.clone());
    let mut params: Vec<Parameter> = path_params.to_vec();
    for p in parameters(root, op.get("parameters")) {
        match params
            .iter_mut()
            .find(|q| q.name == p.name && q.location == p.location)
        {
            Some(existing) => *existing = p,
            None => params.push(p),
        }
    }

    // Swagger 2 carries the body as an `in: body` parameter.
    let body_param = params
        .iter()
        .position(|p| p.location.as_deref() == Some("body"))
        .map(|i| params.remove(i));
    let request_body = match op.get("requestBody") {
        Some(rb) => Some(request_body(root, rb)),
        None => body_param.map(|p| {
            let consumes = string_list(op.get("consumes"));
            let media = if consumes.is_empty() {
                global_consumes.to_vec()
            } else {
                consumes
            };
            let media = if media.is_empty() {
                vec!["application/json".to_string()]
            } else {
                media
            };
            RequestBody {
                description: p.description.clone(),
                required: p.required,
                content: media.into_iter().map(|m| (m, p.schema.clone())).collect(),
            }
        }),
    };

    let responses = op
        .get("responses")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(code, r)| {
                    let r = resolve(root, r);
                    (code.clone(), non_empty_str(r, "description"))
                })
                .collect()
        })
        .unwrap_or_default();

    Operation {
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
        tags: string_list(op.get("tags")),
        summary: non_empty_str(&op_value, "summary"),
        description: non_empty_str(&op_value, "description"),
        operation_id: non_empty_str(&op_value, "operationId"),
        deprecated: op
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        parameters: params,
        request_body,
        responses,
    }
}

fn parameters(root: &Value, list: Option<&Value>) -> Vec<Parameter> {
    let Some(list) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|p| {
            let p = resolve(root, p);
            let name = non_empty_str(p, "name")?;
            // Swagger 2 puts the type on the parameter itself.
            let schema = match p.get("schema") {
                Some(s) => Some(Schema::from_value(s, 0)),
                None if p.get("type").is_some() => Some(Schema::from_value(p, 0)),
                None => None,
            };
            Some(Parameter {
                name,
                location: non_empty_str(p, "in"),
                required: p.get("required").and_then(Value::as_bool).unwrap_or(false),
                description: non_empty_str(p, "description"),
                schema,
            })
        })
        .collect()
}

fn request_body(root: &Value, rb: &Value) -> RequestBody {
    let rb = resolve(root, rb);
    let content = rb
        .get("content")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(media, mt)| {
                    let schema = mt.get("schema").map(|s| Schema::from_value(s, 0));
                    (media.clone(), schema)
                })
                .collect()
        })
        .unwrap_or_default();
    RequestBody {
        description: non_empty_str(rb, "description"),
        required: rb.get("required").and_then(Value::as_bool).unwrap_or(false),
        content,
    }
}

/// Follow a local `$ref` one level; anything else is returned unchanged.
fn resolve<'a>(root: &'a Value, v: &'a Value) -> &'a Value {
    v.get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix('#'))
        .and_then(|pointer| root.pointer(pointer))
        .unwrap_or(v)
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Schema {
    pub fn from_value(v: &Value, depth: usize) -> Schema {
        let mut s = Schema::default();
        if let Some(r) = v.get("$ref").and_then(Value::as_str) {
            s.reference = Some(ref_name(r).to_string());
            return s;
        }
        s.ty = match v.get("type") {
            Some(Value::String(t)) => Some(t.clone()),
            // 3.1 allows a list of types, e.g. ["string", "null"].
            Some(Value::Array(ts)) => {
                let names: Vec<&str> = ts.iter().filter_map(Value::as_str).collect();
                (!names.is_empty()).then(|| names.join(" | "))
            }
            _ => None,
        };
        s.format = non_empty_str(v, "format");
        s.description = non_empty_str(v, "description");
        s.enum_values = v
            .get("enum")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .map(|e| match e {
                        Value::String(x) => x.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if depth >= MAX_SCHEMA_DEPTH {
            return s;
        }
        s.items = v
            .get("items")
            .map(|i| Box::new(Schema::from_value(i, depth + 1)));
        s.required = string_list(v.get("required"));
        s.properties = v
            .get("properties")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(k, p)| (k.clone(), Schema::from_value(p, depth + 1)))
                    .collect()
            })
            .unwrap_or_default();
        s.composition = ["allOf", "oneOf", "anyOf"].iter().find_map(|key| {
            v.get(*key).and_then(Value::as_array).map(|members| {
                (
                    *key,
                    members
                        .iter()
                        .map(|m| Schema::from_value(m, depth + 1))
                        .collect(),
                )
            })
        });
        s
    }
}

/// `#/components/schemas/Pet` -> `Pet`.
pub fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validity_rules() {
        assert!(is_valid_spec(&json!({"openapi": "3.0.3"})));
        assert!(is_valid_spec(&json!({"swagger": "2.0"})));
        assert!(is_valid_spec(&json!({"paths": {}})));
        assert!(!is_valid_spec(&json!({"openapi": "1.0"})));
        assert!(!is_valid_spec(&json!({"name": "x"})));
        assert!(!is_valid_spec(&json!(["paths"])));
    }

    #[test]
    fn yaml_is_parsed_on_demand() {
        let raw = RawSpec::from_text("openapi: 3.0.0\ninfo:\n  title: Pets\npaths: {}\n");
        assert!(matches!(raw, RawSpec::RawYaml(_)));
        let v = raw.into_value().unwrap();
        assert_eq!(v["info"]["title"], "Pets");
        assert!(is_valid_spec(&v));
    }

    #[test]
    fn numeric_info_fields_keep_their_siblings() {
        let v = RawSpec::from_text(
            "openapi: 3.0.0\ninfo:\n  title: Pet Store\n  version: 1.0\n  contact:\n    email: a@b.c\npaths: {}\n",
        )
        .into_value()
        .unwrap();
        let spec = ApiSpec::from_value(&v);
        assert_eq!(spec.info.title.as_deref(), Some("Pet Store"));
        assert_eq!(spec.info.version.as_deref(), Some("1.0"));
        assert_eq!(
            spec.info.contact.and_then(|c| c.email).as_deref(),
            Some("a@b.c")
        );
    }

    #[test]
    fn mistyped_fields_are_dropped_one_by_one() {
        let spec = ApiSpec::from_value(&json!({
            "openapi": "3.0.0",
            "info": {"title": "Billing", "version": 2, "license": "MIT", "description": ["x"]},
            "servers": [{"url": "https://api.example.com", "description": 7}],
            "tags": [{"name": 2024, "description": {"x": 1}}]
        }));
        assert_eq!(spec.info.title.as_deref(), Some("Billing"));
        assert_eq!(spec.info.version.as_deref(), Some("2"));
        assert!(spec.info.license.is_none());
        assert!(spec.info.description.is_none());
        assert_eq!(spec.servers[0].url, "https://api.example.com");
        assert_eq!(spec.servers[0].description.as_deref(), Some("7"));
        assert_eq!(spec.tags[0].name, "2024");
        assert!(spec.tags[0].description.is_none());
    }

    #[test]
    fn swagger2_host_and_base_path_become_servers() {
        let spec = ApiSpec::from_value(&json!({
            "swagger": "2.0",
            "host": "api.example.com",
            "basePath": "/v1",
            "schemes": ["https", "http"]
        }));
        let urls: Vec<&str> = spec.servers.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://api.example.com/v1", "http://api.example.com/v1"]);
    }

    #[test]
    fn path_and_operation_parameters_merge() {
        let spec = ApiSpec::from_value(&json!({
            "openapi": "3.0.0",
            "components": {"parameters": {"Limit": {"name": "limit", "in": "query", "schema": {"type": "integer"}}}},
            "paths": {"/pets/{id}": {
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "get": {"parameters": [
                    {"$ref": "#/components/parameters/Limit"},
                    {"name": "id", "in": "path", "required": true, "description": "Pet id"}
                ], "responses": {"200": {"description": "OK"}}},
                "summary": "not an operation"
            }}
        }));
        assert_eq!(spec.operations.len(), 1);
        let op = &spec.operations[0];
        assert_eq!(op.method, "GET");
        let names: Vec<&str> = op.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "limit"]);
        assert_eq!(op.parameters[0].description.as_deref(), Some("Pet id"));
        assert_eq!(op.responses, vec![("200".to_string(), Some("OK".to_string()))]);
    }

    #[test]
    fn malformed_elements_are_skipped() {
        let spec = ApiSpec::from_value(&json!({
            "info": {"title": 42},
            "tags": [{"name": "ok"}, {"name": ["bad"]}],
            "paths": {"/x": {"get": "nope", "post": {"summary": "Create"}}}
        }));
        assert!(spec.info.title.is_none());
        assert_eq!(spec.tags.len(), 1);
        assert_eq!(spec.operations.len(), 1);
        assert_eq!(spec.operations[0].summary.as_deref(), Some("Create"));
    }

    #[test]
    fn swagger2_body_parameter_becomes_request_body() {
        let spec = ApiSpec::from_value(&json!({
            "swagger": "2.0",
            "consumes": ["application/xml"],
            "paths": {"/pets": {"post": {"parameters": [
                {"name": "pet", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Pet"}}
            ]}}}
        }));
        let op = &spec.operations[0];
        assert!(op.parameters.is_empty());
        let body = op.request_body.as_ref().unwrap();
        assert!(body.required);
        assert_eq!(body.content[0].0, "application/xml");
        assert_eq!(
            body.content[0].1.as_ref().unwrap().reference.as_deref(),
            Some("Pet")
        );
    }
}
