//! Reference rewriting: point converted references at their new files.
//!
//! New references are paths relative to the *output* document's directory,
//! always written with `/` separators. When no relative path exists (say,
//! a different Windows drive) the absolute path is written instead.
//!
//! Two substitution modes exist, selected by [`RewriteMode`]:
//!
//! * **Textual** replaces every `<uri>RAW</uri>` in the whole document. A
//!   second node with the same raw text is rewritten too, even if it was not
//!   part of the plan or resolved differently. RAW is the URI as spelled in
//!   the document, entities included. The text must match exactly, so a URI
//!   written with surrounding whitespace is left alone.
//! * **Structural** replaces the content span recorded for each planned
//!   node during extraction, and nothing else.

use crate::config::RewriteMode;
use quick_xml::escape::escape;
use std::borrow::Cow;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// One substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRewrite {
    /// URI text as found in the document (trimmed, unescaped).
    pub raw_uri: String,
    /// Converted mesh file.
    pub output_path: PathBuf,
    /// Content span of the `<uri>` element the reference came from.
    pub uri_span: Range<usize>,
}

/// The substitutions for one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    entries: Vec<PlannedRewrite>,
}

impl RewritePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw_uri: impl Into<String>, output_path: impl Into<PathBuf>, uri_span: Range<usize>) {
        self.entries.push(PlannedRewrite {
            raw_uri: raw_uri.into(),
            output_path: output_path.into(),
            uri_span,
        });
    }

    pub fn entries(&self) -> &[PlannedRewrite] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Relative path from `base_dir` to `target`, or `None` when the two share
/// no root (different prefixes, or one relative and one absolute).
///
/// Both paths should already be normalised.
pub fn relative_path(target: &Path, base_dir: &Path) -> Option<PathBuf> {
    if target.is_absolute() != base_dir.is_absolute() {
        return None;
    }
    let target: Vec<Component<'_>> = target.components().collect();
    let base: Vec<Component<'_>> = base_dir
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();

    let first_prefix = |c: &[Component<'_>]| match c.first() {
        Some(Component::Prefix(p)) => Some(p.as_os_str().to_os_string()),
        _ => None,
    };
    if first_prefix(&target[..]) != first_prefix(&base[..]) {
        return None;
    }

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if base[common..].iter().any(|c| *c == Component::ParentDir) {
        return None;
    }

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for comp in &target[common..] {
        rel.push(comp.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Some(rel)
}

/// Render `output_path` as the new reference text for a document written
/// to `output_document`.
pub fn reference_text(output_path: &Path, output_document: &Path) -> String {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    let target = crate::pipeline::resolve::normalize_lexically(&absolute(output_path));
    let document = crate::pipeline::resolve::normalize_lexically(&absolute(output_document));
    let base = document.parent().unwrap_or(Path::new("/"));

    let path = relative_path(&target, base).unwrap_or_else(|| {
        debug!(
            "No relative path from {} to {}, keeping absolute",
            base.display(),
            target.display()
        );
        target.clone()
    });
    path.to_string_lossy().replace('\\', "/")
}

/// Applies a [`RewritePlan`] to document text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceRewriter {
    mode: RewriteMode,
}

impl ReferenceRewriter {
    pub fn new(mode: RewriteMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RewriteMode {
        self.mode
    }

    /// Produce the rewritten document text.
    pub fn rewrite(&self, text: &str, output_document: &Path, plan: &RewritePlan) -> String {
        match self.mode {
            RewriteMode::Textual => rewrite_textual(text, output_document, plan),
            RewriteMode::Structural => rewrite_structural(text, output_document, plan),
        }
    }
}

fn rewrite_textual(text: &str, output_document: &Path, plan: &RewritePlan) -> String {
    let mut content = text.to_string();
    for entry in plan.entries() {
        let new_uri = reference_text(&entry.output_path, output_document);
        let from = format!("<uri>{}</uri>", literal_uri(text, entry));
        let to = format!("<uri>{}</uri>", escape(new_uri.as_str()));
        if !content.contains(&from) {
            debug!("No literal {} left to replace", from);
            continue;
        }
        content = content.replace(&from, &to);
        debug!("Updated URI: {} -> {}", entry.raw_uri, new_uri);
    }
    content
}

/// The URI as spelled in the document (entities still escaped), read from
/// the recorded span; the escaped `raw_uri` when the span does not fit.
fn literal_uri<'a>(text: &'a str, entry: &'a PlannedRewrite) -> Cow<'a, str> {
    match text.get(entry.uri_span.clone()).map(str::trim) {
        Some(literal) if !literal.is_empty() => Cow::Borrowed(literal),
        _ => escape(entry.raw_uri.as_str()),
    }
}

fn rewrite_structural(text: &str, output_document: &Path, plan: &RewritePlan) -> String {
    let mut spans: Vec<&PlannedRewrite> = plan.entries().iter().collect();
    spans.sort_by_key(|e| e.uri_span.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for entry in spans {
        let span = &entry.uri_span;
        let valid = span.start >= cursor
            && span.end <= text.len()
            && span.start <= span.end
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);
        if !valid {
            warn!(
                "Skipping rewrite of {}: span {:?} does not fit the document",
                entry.raw_uri, span
            );
            continue;
        }
        let new_uri = reference_text(&entry.output_path, output_document);
        out.push_str(&text[cursor..span.start]);
        out.push_str(&escape(new_uri.as_str()));
        cursor = span.end;
        debug!("Updated URI: {} -> {}", entry.raw_uri, new_uri);
    }
    out.push_str(&text[cursor..]);
    out
}
