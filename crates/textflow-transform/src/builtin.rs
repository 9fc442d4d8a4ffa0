//! Built-in normalizers registered by [`ChainComposer::with_builtins`].

use std::sync::LazyLock;

use regex::Regex;
use textflow_core::TextUnit;

use crate::composer::ChainComposer;
use crate::error::TransformError;

static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|</?[a-zA-Z][^>]*>").expect("valid regex"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s<>"]+|\bwww\.[^\s<>"]+"#).expect("valid regex"));

const HTML_ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

pub const BUILTIN_NAMES: [&str; 8] = [
    "trim",
    "normalize_whitespace",
    "normalize_line_endings",
    "collapse_blank_lines",
    "lowercase",
    "strip_html",
    "strip_urls",
    "remove_empty_lines",
];

pub fn register_builtins(composer: &ChainComposer) {
    composer.register("trim", trim);
    composer.register("normalize_whitespace", normalize_whitespace);
    composer.register("normalize_line_endings", normalize_line_endings);
    composer.register("collapse_blank_lines", collapse_blank_lines);
    composer.register("lowercase", lowercase);
    composer.register("strip_html", strip_html);
    composer.register("strip_urls", strip_urls);
    composer.register("remove_empty_lines", remove_empty_lines);
}

fn trim(unit: TextUnit) -> Result<TextUnit, TransformError> {
    Ok(unit.with_content(unit.content.trim()))
}

/// Collapse runs of spaces and tabs to one space and drop trailing whitespace per line.
fn normalize_whitespace(unit: TextUnit) -> Result<TextUnit, TransformError> {
    let content = unit
        .content
        .lines()
        .map(|line| INLINE_WS.replace_all(line, " ").trim_end().to_owned())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(unit.with_content(content))
}

fn normalize_line_endings(unit: TextUnit) -> Result<TextUnit, TransformError> {
    Ok(unit.with_content(unit.content.replace("\r\n", "\n").replace('\r', "\n")))
}

fn collapse_blank_lines(unit: TextUnit) -> Result<TextUnit, TransformError> {
    let content = BLANK_LINES.replace_all(&unit.content, "\n\n").into_owned();
    Ok(unit.with_content(content))
}

fn lowercase(unit: TextUnit) -> Result<TextUnit, TransformError> {
    Ok(unit.with_content(unit.content.to_lowercase()))
}

fn strip_html(unit: TextUnit) -> Result<TextUnit, TransformError> {
    let removed = HTML_TAG.find_iter(&unit.content).count();
    let mut content = HTML_TAG.replace_all(&unit.content, "").into_owned();
    for (entity, replacement) in HTML_ENTITIES {
        content = content.replace(entity, replacement);
    }
    Ok(unit
        .with_content(content)
        .with_metadata("html_tags_removed", removed))
}

fn strip_urls(unit: TextUnit) -> Result<TextUnit, TransformError> {
    let removed = URL.find_iter(&unit.content).count();
    let content = URL.replace_all(&unit.content, "").into_owned();
    Ok(unit.with_content(content).with_metadata("urls_removed", removed))
}

fn remove_empty_lines(unit: TextUnit) -> Result<TextUnit, TransformError> {
    let content = unit
        .content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(unit.with_content(content))
}
