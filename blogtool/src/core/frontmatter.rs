//! Hugo front matter: split, read, and update.
//!
//! Hugo accepts YAML between `---` lines, TOML between `+++` lines, or a JSON
//! object at the head of the file. Reading is permissive (unknown keys and
//! nested structures are ignored) so that anything Hugo builds also lists here.

use serde_json::Value as JsonValue;
use toml::Value as TomlValue;

/// Front matter flavor, identified by its delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    fn delimiter(self) -> &'static str {
        match self {
            Format::Yaml => "---",
            Format::Toml => "+++",
            Format::Json => "",
        }
    }
}

/// The fields this tool reads. Everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    /// Raw date text, parsed later by `core::derive::parse_date`.
    pub date: Option<String>,
    pub draft: bool,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
}

/// Document split at the front matter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document<'a> {
    /// `None` when the file has no front matter block.
    pub format: Option<Format>,
    /// Text between the delimiters (the whole object for JSON).
    pub raw: &'a str,
    pub body: &'a str,
}

/// Value written by [`upsert_fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

enum Raw {
    Scalar(String),
    List(Vec<String>),
}

/// Split `contents` into front matter and body.
///
/// A delimiter without its closing line is an error, as it is for Hugo.
pub fn split(contents: &str) -> Result<Document<'_>, String> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    for format in [Format::Yaml, Format::Toml] {
        if let Some(found) = split_delimited(contents, format) {
            return found;
        }
    }
    if contents.trim_start().starts_with('{') {
        return split_json(contents);
    }
    Ok(Document {
        format: None,
        raw: "",
        body: contents,
    })
}

/// Split and read the known fields.
pub fn parse(contents: &str) -> Result<(FrontMatter, &str), String> {
    let doc = split(contents)?;
    let pairs = match doc.format {
        None => Vec::new(),
        Some(Format::Yaml) => yaml_pairs(doc.raw)?,
        Some(Format::Toml) => toml_pairs(doc.raw)?,
        Some(Format::Json) => json_pairs(doc.raw)?,
    };
    let mut fm = FrontMatter::default();
    for (key, value) in pairs {
        assign(&mut fm, &key, value)?;
    }
    Ok((fm, doc.body))
}

/// Keep the front matter block and replace everything after it with `body`.
pub fn replace_body(contents: &str, body: &str) -> Result<String, String> {
    let doc = split(contents)?;
    let body = body.trim();
    let Some(format) = doc.format else {
        let mut buf = contents.trim_end().to_string();
        buf.push_str("\n\n");
        buf.push_str(body);
        buf.push('\n');
        return Ok(buf);
    };
    Ok(render(format, doc.raw, &format!("\n\n{body}\n")))
}

/// Set top-level fields in the front matter, keeping every other line as is.
pub fn upsert_fields(contents: &str, fields: &[(&str, FieldValue)]) -> Result<String, String> {
    let doc = split(contents)?;
    let format = doc.format.unwrap_or(Format::Yaml);
    let raw = match format {
        Format::Json => upsert_json(doc.raw, fields)?,
        Format::Yaml | Format::Toml => {
            let mut raw = doc.raw.to_string();
            for (key, value) in fields {
                raw = upsert_line(&raw, format, key, value);
            }
            raw
        }
    };
    let body = if doc.format.is_none() {
        format!("\n{}", doc.body.trim_start_matches('\n'))
    } else {
        doc.body.to_string()
    };
    Ok(render(format, &raw, &body))
}

fn split_delimited(contents: &str, format: Format) -> Option<Result<Document<'_>, String>> {
    let delim = format.delimiter();
    let first = contents.split('\n').next().unwrap_or("");
    if first.trim_end() != delim {
        return None;
    }
    let start = (first.len() + 1).min(contents.len());
    let mut offset = start;
    for line in contents[start..].split_inclusive('\n') {
        if line.trim_end() == delim {
            return Some(Ok(Document {
                format: Some(format),
                raw: &contents[start..offset],
                body: &contents[offset + line.len()..],
            }));
        }
        offset += line.len();
    }
    Some(Err(format!("front matter opened with `{delim}` is never closed")))
}

fn split_json(contents: &str) -> Result<Document<'_>, String> {
    let lead = contents.len() - contents.trim_start().len();
    let object = &contents[lead..];
    let mut stream = serde_json::Deserializer::from_str(object).into_iter::<JsonValue>();
    match stream.next() {
        Some(Ok(JsonValue::Object(_))) => {
            let end = stream.byte_offset();
            Ok(Document {
                format: Some(Format::Json),
                raw: &object[..end],
                body: &object[end..],
            })
        }
        Some(Ok(_)) => Err("JSON front matter must be an object".to_string()),
        Some(Err(err)) => Err(format!("invalid JSON front matter: {err}")),
        None => Err("empty JSON front matter".to_string()),
    }
}

fn render(format: Format, raw: &str, body: &str) -> String {
    let mut buf = String::new();
    match format {
        Format::Json => buf.push_str(raw.trim_end()),
        Format::Yaml | Format::Toml => {
            let delim = format.delimiter();
            buf.push_str(delim);
            buf.push('\n');
            buf.push_str(raw.trim_end_matches('\n'));
            if !raw.trim().is_empty() {
                buf.push('\n');
            }
            buf.push_str(delim);
        }
    }
    if !body.starts_with('\n') {
        buf.push('\n');
    }
    buf.push_str(body);
    buf
}

fn yaml_pairs(raw: &str) -> Result<Vec<(String, Raw)>, String> {
    let mut pairs: Vec<(String, Raw)> = Vec::new();
    let mut open_list: Option<usize> = None;

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if line.starts_with([' ', '\t', '-']) {
            // Block list items belong to the last key with an empty value;
            // any other indented line is nested structure we don't read.
            if let Some(pos) = open_list
                && let Some(item) = trimmed.strip_prefix('-')
            {
                let item = unquote(item.trim());
                if let Raw::List(items) = &mut pairs[pos].1
                    && !item.is_empty()
                {
                    items.push(item);
                }
            }
            continue;
        }
        let (key, value) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("line {}: expected `key: value`, got '{trimmed}'", idx + 1))?;
        let key = key.trim().to_string();
        let value = value.trim();
        if value.is_empty() {
            pairs.push((key, Raw::List(Vec::new())));
            open_list = Some(pairs.len() - 1);
            continue;
        }
        open_list = None;
        pairs.push((key, parse_yaml_value(value)));
    }
    Ok(pairs)
}

fn parse_yaml_value(value: &str) -> Raw {
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        let items = inner
            .split(',')
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
        return Raw::List(items);
    }
    Raw::Scalar(unquote(value))
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return inner.replace("\\\"", "\"");
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.replace("''", "'");
        }
    }
    // Plain YAML scalars end at ` #`.
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn toml_pairs(raw: &str) -> Result<Vec<(String, Raw)>, String> {
    let table: toml::Table =
        toml::from_str(raw).map_err(|err| format!("invalid TOML front matter: {err}"))?;
    let mut pairs = Vec::new();
    for (key, value) in table {
        let converted = match value {
            TomlValue::String(s) => Raw::Scalar(s),
            TomlValue::Boolean(b) => Raw::Scalar(b.to_string()),
            TomlValue::Datetime(dt) => Raw::Scalar(dt.to_string()),
            TomlValue::Integer(i) => Raw::Scalar(i.to_string()),
            TomlValue::Float(f) => Raw::Scalar(f.to_string()),
            TomlValue::Array(items) => Raw::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        TomlValue::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            TomlValue::Table(_) => continue,
        };
        pairs.push((key, converted));
    }
    Ok(pairs)
}

fn json_pairs(raw: &str) -> Result<Vec<(String, Raw)>, String> {
    let value: JsonValue =
        serde_json::from_str(raw).map_err(|err| format!("invalid JSON front matter: {err}"))?;
    let JsonValue::Object(map) = value else {
        return Err("JSON front matter must be an object".to_string());
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        let converted = match value {
            JsonValue::String(s) => Raw::Scalar(s),
            JsonValue::Bool(b) => Raw::Scalar(b.to_string()),
            JsonValue::Number(n) => Raw::Scalar(n.to_string()),
            JsonValue::Array(items) => Raw::List(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            JsonValue::Null | JsonValue::Object(_) => continue,
        };
        pairs.push((key, converted));
    }
    Ok(pairs)
}

fn assign(fm: &mut FrontMatter, key: &str, value: Raw) -> Result<(), String> {
    match key.to_ascii_lowercase().as_str() {
        "title" => fm.title = scalar(value).filter(|s| !s.trim().is_empty()),
        "date" => fm.date = scalar(value).filter(|s| !s.trim().is_empty()),
        "description" => fm.description = scalar(value),
        "slug" => fm.slug = scalar(value).filter(|s| !s.trim().is_empty()),
        "tags" => fm.tags = list(value),
        "keywords" => fm.keywords = list(value),
        "draft" => {
            if let Some(text) = scalar(value) {
                fm.draft = parse_bool(&text)
                    .ok_or_else(|| format!("draft must be true or false, got '{text}'"))?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn scalar(value: Raw) -> Option<String> {
    match value {
        Raw::Scalar(s) => Some(s),
        // `title:` with nothing after it reads as an empty list.
        Raw::List(items) if items.is_empty() => None,
        Raw::List(items) => Some(items.join(", ")),
    }
}

fn list(value: Raw) -> Vec<String> {
    match value {
        Raw::List(items) => items,
        Raw::Scalar(s) if s.trim().is_empty() => Vec::new(),
        Raw::Scalar(s) => vec![s],
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn upsert_line(raw: &str, format: Format, key: &str, value: &FieldValue) -> String {
    let rendered = match format {
        Format::Toml => format!("{key} = {}", render_toml(value)),
        _ => format!("{key}: {}", render_yaml(value)),
    };
    let separator = if format == Format::Toml { '=' } else { ':' };

    let mut lines = Vec::new();
    let mut replaced = false;
    let mut skipping = false;
    for line in raw.lines() {
        if skipping {
            match format {
                Format::Toml => {
                    // Inside a multi-line array; its closing bracket ends the value.
                    if line.contains(']') {
                        skipping = false;
                    }
                    continue;
                }
                _ => {
                    if line.starts_with([' ', '\t', '-']) {
                        continue;
                    }
                    skipping = false;
                }
            }
        }
        if !line.starts_with([' ', '\t'])
            && let Some((k, v)) = line.split_once(separator)
            && k.trim() == key
        {
            if !replaced {
                lines.push(rendered.clone());
                replaced = true;
            }
            let v = v.trim();
            skipping = match format {
                Format::Toml => v.starts_with('[') && !v.contains(']'),
                _ => v.is_empty(),
            };
            continue;
        }
        lines.push(line.to_string());
    }
    if !replaced {
        lines.push(rendered);
    }

    let mut buf = lines.join("\n");
    buf.push('\n');
    buf
}

fn render_yaml(value: &FieldValue) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
    match value {
        FieldValue::Text(s) => quote(s),
        FieldValue::List(items) => {
            let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}

fn render_toml(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => TomlValue::String(s.clone()).to_string(),
        FieldValue::List(items) => TomlValue::Array(
            items
                .iter()
                .map(|s| TomlValue::String(s.clone()))
                .collect(),
        )
        .to_string(),
    }
}

fn upsert_json(raw: &str, fields: &[(&str, FieldValue)]) -> Result<String, String> {
    let mut value: JsonValue =
        serde_json::from_str(raw).map_err(|err| format!("invalid JSON front matter: {err}"))?;
    let JsonValue::Object(map) = &mut value else {
        return Err("JSON front matter must be an object".to_string());
    };
    for (key, field) in fields {
        let json = match field {
            FieldValue::Text(s) => JsonValue::String(s.clone()),
            FieldValue::List(items) => {
                JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
            }
        };
        map.insert((*key).to_string(), json);
    }
    serde_json::to_string_pretty(&value).map_err(|err| format!("serialize front matter: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_yaml_fields() {
        let doc = "---\ntitle: \"Hello\"\ndate: 2025-06-28T10:00:00Z\ndraft: true\ntags: [rust, 'blog']\n---\n\nBody text\n";
        let (fm, body) = parse(doc).expect("parse");
        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.date.as_deref(), Some("2025-06-28T10:00:00Z"));
        assert!(fm.draft);
        assert_eq!(fm.tags, vec!["rust", "blog"]);
        assert_eq!(body.trim(), "Body text");
    }

    #[test]
    fn reads_yaml_block_lists_and_ignores_nested_maps() {
        let doc = "---\ntags:\n  - one\n  - \"two\"\nparams:\n  author: me\ntitle: Post\n---\nbody";
        let (fm, _) = parse(doc).expect("parse");
        assert_eq!(fm.tags, vec!["one", "two"]);
        assert_eq!(fm.title.as_deref(), Some("Post"));
    }

    #[test]
    fn reads_toml_fields() {
        let doc = "+++\ntitle = 'Toml post'\ndate = 2025-01-02T03:04:05Z\ndraft = false\nkeywords = ['a', 'b']\n+++\nbody\n";
        let (fm, body) = parse(doc).expect("parse");
        assert_eq!(fm.title.as_deref(), Some("Toml post"));
        assert_eq!(fm.date.as_deref(), Some("2025-01-02T03:04:05Z"));
        assert!(!fm.draft);
        assert_eq!(fm.keywords, vec!["a", "b"]);
        assert_eq!(body, "body\n");
    }

    #[test]
    fn reads_json_fields() {
        let doc = "{\n  \"title\": \"Json\",\n  \"date\": \"2025-03-01\"\n}\nThe body";
        let (fm, body) = parse(doc).expect("parse");
        assert_eq!(fm.title.as_deref(), Some("Json"));
        assert_eq!(fm.date.as_deref(), Some("2025-03-01"));
        assert_eq!(body.trim(), "The body");
    }

    #[test]
    fn missing_front_matter_is_accepted() {
        let (fm, body) = parse("# Just a heading\n").expect("parse");
        assert_eq!(fm, FrontMatter::default());
        assert_eq!(body, "# Just a heading\n");
    }

    #[test]
    fn unterminated_front_matter_is_rejected() {
        let err = parse("---\ntitle: x\nno closing line\n").unwrap_err();
        assert!(err.contains("never closed"));
    }

    #[test]
    fn invalid_draft_value_is_rejected() {
        let err = parse("---\ndraft: maybe\n---\n").unwrap_err();
        assert!(err.contains("draft"));
    }

    #[test]
    fn replace_body_keeps_front_matter() {
        let doc = "---\ntitle: ''\ndate: 2025-06-28\n---\n\nplaceholder\n";
        let updated = replace_body(doc, "New body").expect("replace");
        assert_eq!(updated, "---\ntitle: ''\ndate: 2025-06-28\n---\n\nNew body\n");
    }

    #[test]
    fn upsert_replaces_and_appends_yaml_fields() {
        let doc = "---\ntitle: ''\ntags:\n  - old\ndraft: true\n---\nbody\n";
        let updated = upsert_fields(
            doc,
            &[
                ("title", FieldValue::Text("It's here".to_string())),
                ("tags", FieldValue::List(vec!["a".to_string(), "b".to_string()])),
                ("description", FieldValue::Text("desc".to_string())),
            ],
        )
        .expect("upsert");
        assert_eq!(
            updated,
            "---\ntitle: 'It''s here'\ntags: ['a', 'b']\ndraft: true\ndescription: 'desc'\n---\nbody\n"
        );
        let (fm, _) = parse(&updated).expect("reparse");
        assert_eq!(fm.title.as_deref(), Some("It's here"));
        assert_eq!(fm.tags, vec!["a", "b"]);
    }

    #[test]
    fn upsert_writes_toml_syntax() {
        let doc = "+++\ntitle = ''\ntags = []\n+++\nbody\n";
        let updated = upsert_fields(
            doc,
            &[
                ("title", FieldValue::Text("T".to_string())),
                ("tags", FieldValue::List(vec!["x".to_string()])),
            ],
        )
        .expect("upsert");
        let (fm, body) = parse(&updated).expect("reparse");
        assert_eq!(fm.title.as_deref(), Some("T"));
        assert_eq!(fm.tags, vec!["x"]);
        assert_eq!(body, "body\n");
    }
}
