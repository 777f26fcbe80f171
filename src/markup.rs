//! reStructuredText directive and role hosting.
//!
//! The site's markup goes through the generator's own reST renderer; this
//! module only covers the part this crate extends: a [`Registry`] of named
//! [`Directive`]s and [`Role`]s, the [`Invocation`] a directive receives,
//! and the [`Node`]s it answers with. Registration is an explicit call made
//! once during setup.
//!
//! [`expand`] runs a registry over a document and replaces every block
//! of a registered directive and every registered inline role with raw
//! HTML, leaving everything else untouched:
//!
//! ```text
//! .. scan:: Quorum, issue 64           .. raw:: html
//!    :path: Quorum_64            →
//!    :desc: Club magazine                <div class="scan-entry" ...
//!
//! Scanned by :scan:`me`.               Scanned by :raw-html:`<i>me</i>`.
//! ```
//!
//! A directive that fails validation (argument count, unknown option,
//! unexpected content) or answers with an error node contributes nothing
//! to the output; the error is reported with the directive's line.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)\.\.\s+([A-Za-z0-9][A-Za-z0-9_.+-]*)::(?:\s+(.*?))?\s*$")
        .expect("directive pattern must compile")
});

static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:([^:\s][^:]*):(?:\s+(.*?))?\s*$").expect("option pattern must compile")
});

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z0-9][A-Za-z0-9_.+-]*):`([^`]+)`").expect("role pattern must compile")
});

/// Name of the raw-HTML role declared in front of documents with expanded roles.
const RAW_HTML_ROLE: &str = "raw-html";

/// What a directive produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Pass-through output in `format` (always `"html"` here).
    Raw { format: String, content: String },
    /// A document-level error at a source line.
    Error { message: String, line: usize },
}

impl Node {
    pub fn raw_html(content: impl Into<String>) -> Self {
        Node::Raw {
            format: "html".to_string(),
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>, line: usize) -> Self {
        Node::Error {
            message: message.into(),
            line,
        }
    }
}

/// Shape of the input a directive accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveSpec {
    pub required_arguments: usize,
    pub optional_arguments: usize,
    /// The last argument swallows the rest of the argument text, spaces included.
    pub final_argument_whitespace: bool,
    pub options: &'static [&'static str],
    pub has_content: bool,
}

/// One occurrence of a directive in a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub content: Vec<String>,
    /// 1-based source line of the directive marker.
    pub line: usize,
}

impl Invocation {
    pub fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            ..Self::default()
        }
    }

    pub fn argument(mut self, value: &str) -> Self {
        self.arguments.push(value.to_string());
        self
    }

    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Option value with surrounding whitespace removed; empty when absent.
    pub fn option_str(&self, key: &str) -> &str {
        self.options.get(key).map(|v| v.trim()).unwrap_or("")
    }
}

pub trait Directive: Send + Sync {
    fn spec(&self) -> DirectiveSpec;
    fn run(&self, invocation: &Invocation) -> Vec<Node>;
}

pub trait Role: Send + Sync {
    fn run(&self, text: &str, line: usize) -> Vec<Node>;
}

/// Named directives and roles available to a document.
#[derive(Default)]
pub struct Registry {
    directives: BTreeMap<String, Box<dyn Directive>>,
    roles: BTreeMap<String, Box<dyn Role>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_directive(&mut self, name: &str, directive: impl Directive + 'static) {
        tracing::debug!(name, "directive registered");
        self.directives.insert(name.to_string(), Box::new(directive));
    }

    pub fn register_role(&mut self, name: &str, role: impl Role + 'static) {
        tracing::debug!(name, "role registered");
        self.roles.insert(name.to_string(), Box::new(role));
    }

    pub fn directive(&self, name: &str) -> Option<&dyn Directive> {
        self.directives.get(name).map(|d| d.as_ref())
    }

    pub fn role(&self, name: &str) -> Option<&dyn Role> {
        self.roles.get(name).map(|r| r.as_ref())
    }

    /// Validate a raw directive occurrence against its spec and run it.
    ///
    /// `None` if no directive of that name is registered.
    pub fn invoke(
        &self,
        name: &str,
        argument_text: &str,
        options: Vec<(String, String)>,
        content: Vec<String>,
        line: usize,
    ) -> Option<Vec<Node>> {
        let directive = self.directive(name)?;
        let spec = directive.spec();
        let invocation = match build_invocation(&spec, name, argument_text, options, content, line) {
            Ok(inv) => inv,
            Err(message) => {
                return Some(vec![Node::error(
                    format!("Error in \"{name}\" directive: {message}"),
                    line,
                )]);
            }
        };
        Some(directive.run(&invocation))
    }
}

fn split_arguments(spec: &DirectiveSpec, text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let max = spec.required_arguments + spec.optional_arguments;
    if spec.final_argument_whitespace && max > 0 {
        text.splitn(max, char::is_whitespace)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}

fn build_invocation(
    spec: &DirectiveSpec,
    name: &str,
    argument_text: &str,
    options: Vec<(String, String)>,
    content: Vec<String>,
    line: usize,
) -> Result<Invocation, String> {
    let arguments = split_arguments(spec, argument_text);
    let max = spec.required_arguments + spec.optional_arguments;
    if arguments.len() < spec.required_arguments {
        return Err(format!(
            "{} argument(s) required, {} supplied.",
            spec.required_arguments,
            arguments.len()
        ));
    }
    if arguments.len() > max {
        return Err(format!("maximum {max} argument(s) allowed, {} supplied.", arguments.len()));
    }

    let mut parsed = BTreeMap::new();
    for (key, value) in options {
        if !spec.options.contains(&key.as_str()) {
            return Err(format!("unknown option: \"{key}\"."));
        }
        if parsed.insert(key.clone(), value).is_some() {
            return Err(format!("duplicate option \"{key}\"."));
        }
    }

    if !spec.has_content && content.iter().any(|l| !l.trim().is_empty()) {
        return Err("no content permitted.".to_string());
    }

    Ok(Invocation {
        name: name.to_string(),
        arguments,
        options: parsed,
        content,
        line,
    })
}

/// An error reported while expanding a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentError {
    pub line: usize,
    pub message: String,
}

/// Result of [`expand`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expanded {
    pub text: String,
    pub errors: Vec<DocumentError>,
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// A directive block split into its parts.
struct Block {
    argument_text: String,
    options: Vec<(String, String)>,
    content: Vec<String>,
    /// Index of the first line after the block.
    end: usize,
}

/// Parse the body of a directive whose marker is `lines[start]` at `base` indent.
fn parse_block(lines: &[&str], start: usize, base: usize, first_argument: &str) -> Block {
    let mut end = start + 1;
    let mut last_nonblank = start;
    while end < lines.len() {
        let line = lines[end];
        if !line.trim().is_empty() {
            if indent_width(line) <= base {
                break;
            }
            last_nonblank = end;
        }
        end += 1;
    }
    let body: &[&str] = if last_nonblank > start {
        &lines[start + 1..=last_nonblank]
    } else {
        &[]
    };

    let body_indent = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_width(l))
        .min()
        .unwrap_or(base + 3);

    let mut argument_text = first_argument.to_string();
    let mut options: Vec<(String, String)> = Vec::new();
    let mut content = Vec::new();
    let mut in_content = false;
    for line in body {
        if in_content {
            content.push(line.get(body_indent..).unwrap_or("").trim_end().to_string());
            continue;
        }
        let stripped = line.trim();
        if stripped.is_empty() {
            in_content = true;
            continue;
        }
        if let Some(caps) = OPTION_RE.captures(stripped) {
            let value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            options.push((caps[1].to_string(), value.to_string()));
        } else if let Some((_, value)) = options.last_mut() {
            // Continuation of a multi-line option value.
            value.push(' ');
            value.push_str(stripped);
        } else {
            argument_text.push(' ');
            argument_text.push_str(stripped);
        }
    }
    while content.first().is_some_and(|l| l.is_empty()) {
        content.remove(0);
    }

    Block {
        argument_text,
        options,
        content,
        end: last_nonblank + 1,
    }
}

/// Replace registered roles on one line. Returns the line and whether any
/// role was expanded.
fn expand_roles(
    registry: &Registry,
    line: &str,
    line_no: usize,
    errors: &mut Vec<DocumentError>,
) -> (String, bool) {
    let mut expanded = false;
    let out = ROLE_RE.replace_all(line, |caps: &Captures| {
        let original = caps[0].to_string();
        let Some(role) = registry.role(&caps[1]) else {
            return original;
        };
        let mut html = String::new();
        for node in role.run(&caps[2], line_no) {
            match node {
                Node::Raw { content, .. } => html.push_str(&content),
                Node::Error { message, line } => {
                    errors.push(DocumentError { line, message });
                    return original;
                }
            }
        }
        expanded = true;
        format!(":{RAW_HTML_ROLE}:`{}`", html.replace('`', "\\`"))
    });
    (out.into_owned(), expanded)
}

/// Expand registered directives and roles in a reST document.
pub fn expand(registry: &Registry, source: &str) -> Expanded {
    let lines: Vec<&str> = source.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut errors = Vec::new();
    let mut used_roles = false;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let line_no = i + 1;
        let caps = DIRECTIVE_RE.captures(line);
        let registered = caps
            .as_ref()
            .filter(|c| registry.directive(&c[2]).is_some());
        let Some(caps) = registered else {
            let (expanded, used) = expand_roles(registry, line, line_no, &mut errors);
            used_roles |= used;
            out.push(expanded);
            i += 1;
            continue;
        };

        let indent = caps[1].to_string();
        let name = caps[2].to_string();
        let first_argument = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let block = parse_block(&lines, i, indent.len(), first_argument);
        let nodes = registry
            .invoke(&name, &block.argument_text, block.options, block.content, line_no)
            .unwrap_or_default();

        let mut raw = String::new();
        for node in nodes {
            match node {
                Node::Raw { content, .. } => raw.push_str(&content),
                Node::Error { message, line } => errors.push(DocumentError { line, message }),
            }
        }
        if !raw.trim().is_empty() {
            out.push(format!("{indent}.. raw:: html"));
            out.push(String::new());
            for raw_line in raw.trim_matches('\n').lines() {
                if raw_line.trim().is_empty() {
                    out.push(String::new());
                } else {
                    out.push(format!("{indent}   {raw_line}"));
                }
            }
        }
        i = block.end;
    }

    let mut text = String::new();
    if used_roles {
        text.push_str(&format!(".. role:: {RAW_HTML_ROLE}(raw)\n   :format: html\n\n"));
    }
    text.push_str(&out.join("\n"));
    if source.ends_with('\n') {
        text.push('\n');
    }
    Expanded { text, errors }
}
