//! Derived display fields: title, preview, and date.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Preview length in characters, before the ellipsis.
pub const PREVIEW_CHARS: usize = 150;

const ELLIPSIS: &str = "...";
const MAX_TITLE_LINE_CHARS: usize = 100;

static DATE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})[-_]").unwrap());
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[<%].*?[>%]\}\}").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*_`>\[\]]").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Pick a title: explicit front matter, else the first body line, else the filename.
pub fn derive_title(explicit: Option<&str>, body: &str, name: &str) -> String {
    if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    if let Some(title) = title_from_body(body) {
        return title;
    }
    prettify_name(name)
}

/// First non-empty body line with markdown markers removed, when it reads like a title.
pub fn title_from_body(body: &str) -> Option<String> {
    let line = body.lines().map(str::trim).find(|line| !line.is_empty())?;
    if line.starts_with("http") || line.chars().count() >= MAX_TITLE_LINE_CHARS {
        return None;
    }
    let stripped = strip_markdown(line);
    let stripped = stripped.trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Turn `2025-06-28-my-first-post.md` into `My First Post`.
pub fn prettify_name(name: &str) -> String {
    let stem = name
        .strip_suffix(".markdown")
        .or_else(|| name.strip_suffix(".md"))
        .unwrap_or(name);
    let stem = DATE_PREFIX_RE.replace(stem, "");
    stem.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Plain-text preview of the body, cut at a word boundary.
pub fn derive_preview(body: &str, max_chars: usize) -> String {
    let text = strip_markdown(body);
    let text = SPACE_RE.replace_all(&text, " ");
    truncate_words(text.trim(), max_chars)
}

fn strip_markdown(text: &str) -> String {
    let text = SHORTCODE_RE.replace_all(text, "");
    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HTML_TAG_RE.replace_all(&text, "");
    MARKER_RE.replace_all(&text, "").into_owned()
}

fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let head = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}{ELLIPSIS}", head.trim_end())
}

/// Parse a front matter date.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Values without an offset are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt);
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    let naive = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&naive.and_hms_opt(0, 0, 0)?).fixed_offset())
}

/// Date encoded as a `YYYY-MM-DD-` filename prefix.
pub fn date_from_name(name: &str) -> Option<DateTime<FixedOffset>> {
    let caps = DATE_PREFIX_RE.captures(name)?;
    parse_date(caps.get(1)?.as_str())
}

/// URL-friendly slug: lowercase ASCII alphanumerics joined by single dashes.
///
/// Other characters are dropped, so a title without any yields an empty slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// `YYYY-MM-DD-<slug>.md`, or a time-of-day suffix when the title has no usable words.
pub fn micropost_filename(now: DateTime<FixedOffset>, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        return format!("{}.md", now.format("%Y-%m-%d-%H%M%S"));
    }
    format!("{}-{slug}.md", now.format("%Y-%m-%d"))
}
