//! Markdown rendering of an [`ApiSpec`].

use super::model::{ApiSpec, Operation, Parameter, Schema};

const UNTAGGED: &str = "Other";
const MAX_SUMMARY_PROPERTIES: usize = 8;

pub fn to_markdown(spec: &ApiSpec) -> String {
    let mut out = String::new();
    header(&mut out, spec);

    if !spec.servers.is_empty() {
        out.push_str("## Servers\n\n");
        for s in &spec.servers {
            match s.description.as_deref() {
                Some(d) if !d.trim().is_empty() => {
                    out.push_str(&format!("- {} - {}\n", s.url, d.trim()))
                }
                _ => out.push_str(&format!("- {}\n", s.url)),
            }
        }
        out.push('\n');
    }

    if !spec.tags.is_empty() {
        out.push_str("## Tags\n\n");
        for t in &spec.tags {
            match t.description.as_deref() {
                Some(d) if !d.trim().is_empty() => {
                    out.push_str(&format!("- **{}**: {}\n", t.name, d.trim()))
                }
                _ => out.push_str(&format!("- **{}**\n", t.name)),
            }
        }
        out.push('\n');
    }

    if !spec.operations.is_empty() {
        out.push_str("## Endpoints\n\n");
        for (group, ops) in group_by_tag(spec) {
            out.push_str(&format!("### {group}\n\n"));
            for op in ops {
                operation(&mut out, op);
            }
        }
    }

    if !spec.schemas.is_empty() {
        out.push_str("## Models\n\n");
        for (name, schema) in &spec.schemas {
            model(&mut out, name, schema);
        }
    }

    out.trim_end().to_string()
}

/// One line per endpoint.
pub fn to_compact_markdown(spec: &ApiSpec) -> String {
    let mut out = String::new();
    let title = spec.info.title.as_deref().unwrap_or("API");
    match spec.info.version.as_deref() {
        Some(v) => out.push_str(&format!("# {title} (v{v})\n\n")),
        None => out.push_str(&format!("# {title}\n\n")),
    }
    for op in &spec.operations {
        let line = op
            .summary
            .as_deref()
            .or(op.description.as_deref())
            .map(first_line)
            .unwrap_or_default();
        if line.is_empty() {
            out.push_str(&format!("- `{} {}`\n", op.method, op.path));
        } else {
            out.push_str(&format!("- `{} {}` - {}\n", op.method, op.path, line));
        }
    }
    out.trim_end().to_string()
}

fn header(out: &mut String, spec: &ApiSpec) {
    let info = &spec.info;
    out.push_str(&format!("# {}\n\n", info.title.as_deref().unwrap_or("API Documentation")));
    if let Some(v) = &info.version {
        out.push_str(&format!("**Version:** {v}\n"));
    }
    if let Some(v) = &spec.spec_version {
        out.push_str(&format!("**Spec:** {v}\n"));
    }
    if let Some(c) = &info.contact {
        let mut parts = Vec::new();
        if let Some(n) = &c.name {
            parts.push(n.clone());
        }
        if let Some(e) = &c.email {
            parts.push(format!("<{e}>"));
        }
        if let Some(u) = &c.url {
            parts.push(format!("({u})"));
        }
        if !parts.is_empty() {
            out.push_str(&format!("**Contact:** {}\n", parts.join(" ")));
        }
    }
    if let Some(l) = &info.license {
        match (&l.name, &l.url) {
            (Some(n), Some(u)) => out.push_str(&format!("**License:** [{n}]({u})\n")),
            (Some(n), None) => out.push_str(&format!("**License:** {n}\n")),
            (None, Some(u)) => out.push_str(&format!("**License:** {u}\n")),
            (None, None) => {}
        }
    }
    out.push('\n');
    if let Some(d) = info.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        out.push_str(d);
        out.push_str("\n\n");
    }
}

/// Declared tags first, then tags only seen on operations, then untagged operations.
/// An operation is listed under its first tag.
fn group_by_tag(spec: &ApiSpec) -> Vec<(String, Vec<&Operation>)> {
    let mut groups: Vec<(String, Vec<&Operation>)> = spec
        .tags
        .iter()
        .map(|t| (t.name.clone(), Vec::new()))
        .collect();
    let mut untagged = Vec::new();
    for op in &spec.operations {
        let Some(tag) = op.tags.first() else {
            untagged.push(op);
            continue;
        };
        match groups.iter_mut().find(|(name, _)| name == tag) {
            Some((_, ops)) => ops.push(op),
            None => groups.push((tag.clone(), vec![op])),
        }
    }
    groups.retain(|(_, ops)| !ops.is_empty());
    if !untagged.is_empty() {
        groups.push((UNTAGGED.to_string(), untagged));
    }
    groups
}

fn operation(out: &mut String, op: &Operation) {
    let deprecated = if op.deprecated { " (deprecated)" } else { "" };
    out.push_str(&format!("#### `{} {}`{deprecated}\n\n", op.method, op.path));
    if let Some(s) = &op.summary {
        out.push_str(&format!("**Summary:** {}\n\n", s.trim()));
    }
    if let Some(d) = &op.description {
        out.push_str(&format!("{}\n\n", d.trim()));
    }
    if let Some(id) = &op.operation_id {
        out.push_str(&format!("**Operation ID:** `{id}`\n\n"));
    }
    if !op.parameters.is_empty() {
        out.push_str("**Parameters:**\n\n");
        for p in &op.parameters {
            parameter(out, p);
        }
        out.push('\n');
    }
    if let Some(body) = &op.request_body {
        let required = if body.required { " (required)" } else { "" };
        out.push_str(&format!("**Request Body:**{required}\n\n"));
        if let Some(d) = &body.description {
            out.push_str(&format!("{}\n\n", d.trim()));
        }
        for (media, schema) in &body.content {
            match schema {
                Some(s) => out.push_str(&format!("- `{media}`: {}\n", schema_summary(s))),
                None => out.push_str(&format!("- `{media}`\n")),
            }
        }
        out.push('\n');
    }
    if !op.responses.is_empty() {
        out.push_str("**Responses:**\n\n");
        for (code, desc) in &op.responses {
            match desc {
                Some(d) => out.push_str(&format!("- `{code}`: {}\n", first_line(d))),
                None => out.push_str(&format!("- `{code}`\n")),
            }
        }
        out.push('\n');
    }
}

fn parameter(out: &mut String, p: &Parameter) {
    let mut meta = Vec::new();
    if let Some(loc) = &p.location {
        meta.push(loc.clone());
    }
    if let Some(s) = &p.schema {
        meta.push(schema_summary(s));
    }
    if p.required {
        meta.push("required".to_string());
    }
    let meta = if meta.is_empty() {
        String::new()
    } else {
        format!(" ({})", meta.join(", "))
    };
    match &p.description {
        Some(d) => out.push_str(&format!("- `{}`{meta}: {}\n", p.name, first_line(d))),
        None => out.push_str(&format!("- `{}`{meta}\n", p.name)),
    }
}

fn model(out: &mut String, name: &str, schema: &Schema) {
    out.push_str(&format!("### {name}\n\n"));
    if let Some(d) = &schema.description {
        out.push_str(&format!("{}\n\n", d.trim()));
    }
    out.push_str(&format!("**Type:** {}\n\n", schema_summary_shallow(schema)));
    if !schema.properties.is_empty() {
        out.push_str("**Properties:**\n\n");
        for (prop, s) in &schema.properties {
            let required = if schema.required.iter().any(|r| r == prop) {
                " (required)"
            } else {
                ""
            };
            let mut line = format!("- `{prop}`: {}{required}", schema_summary(s));
            if let Some(d) = &s.description {
                line.push_str(&format!(" - {}", first_line(d)));
            }
            if !s.enum_values.is_empty() {
                line.push_str(&format!(" [enum: {}]", s.enum_values.join(", ")));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }
    if !schema.enum_values.is_empty() {
        out.push_str(&format!("**Enum:** {}\n\n", schema.enum_values.join(", ")));
    }
}

/// Compact one-line description of a schema: a model name, a type, or an object's field list.
pub fn schema_summary(s: &Schema) -> String {
    if let Some(r) = &s.reference {
        return r.clone();
    }
    if let Some((kind, members)) = &s.composition {
        let names: Vec<String> = members.iter().map(schema_summary).collect();
        return format!("{kind}({})", names.join(" | "));
    }
    match s.ty.as_deref() {
        Some("array") => match &s.items {
            Some(items) => format!("array of {}", schema_summary(items)),
            None => "array".to_string(),
        },
        Some("object") | None if !s.properties.is_empty() => {
            let mut names: Vec<&str> = s
                .properties
                .iter()
                .take(MAX_SUMMARY_PROPERTIES)
                .map(|(k, _)| k.as_str())
                .collect();
            if s.properties.len() > MAX_SUMMARY_PROPERTIES {
                names.push("...");
            }
            format!("object {{ {} }}", names.join(", "))
        }
        _ => schema_summary_shallow(s),
    }
}

fn schema_summary_shallow(s: &Schema) -> String {
    if let Some(r) = &s.reference {
        return r.clone();
    }
    let ty = s.ty.clone().unwrap_or_else(|| {
        if s.properties.is_empty() {
            "any".to_string()
        } else {
            "object".to_string()
        }
    });
    match &s.format {
        Some(f) => format!("{ty} ({f})"),
        None => ty,
    }
}

fn first_line(s: &str) -> String {
    s.trim().lines().next().unwrap_or("").trim().to_string()
}
