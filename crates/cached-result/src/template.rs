//! Key templates
//!
//! A subset of Python's `str.format` field syntax, parsed once and rendered
//! against call arguments:
//!
//! - `{}` automatic numbering, `{0}` positional, `{name}` keyword
//! - `{0.field.sub}` attribute chains and `{0[1]}` / `{0[key]}` items
//! - `{{` and `}}` for literal braces
//!
//! Format specs (`{0:>4}`) and conversions (`{0!r}`) are rejected.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::args::Args;

/// Template parse or render failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{` without a matching `}`
    #[error("single '{{' encountered in format string")]
    UnmatchedOpen,

    /// `}` outside a field and not doubled
    #[error("single '}}' encountered in format string")]
    UnmatchedClose,

    /// `{}` and `{0}` used in the same template
    #[error("cannot mix automatic and manual field numbering")]
    MixedNumbering,

    /// Format spec, conversion or nested field
    #[error("unsupported format field {{{0}}}")]
    Unsupported(String),

    /// Field syntax error such as `{0.}` or `{0[]}`
    #[error("malformed format field {{{0}}}")]
    Malformed(String),

    /// `{n}` with fewer than `n + 1` positional arguments
    #[error("replacement index {0} out of range for positional args")]
    IndexOutOfRange(usize),

    /// `{name}` with no such keyword argument
    #[error("missing keyword argument {0:?}")]
    MissingNamed(String),

    /// Attribute or item lookup that found nothing
    #[error("field {field:?} has no attribute or item {part:?}")]
    MissingAttribute {
        /// Full field text
        field: String,
        /// Attribute or item that was not found
        part: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Root {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Accessor {
    Attr(String),
    Item(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    text: String,
    root: Root,
    path: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Field),
}

#[derive(Clone, Copy, PartialEq)]
enum Numbering {
    Auto,
    Manual,
}

/// A parsed key template
///
/// Parsing never fails eagerly: a malformed template is kept and reports
/// its error each time it is rendered, so configuration mistakes surface
/// at the call that computes a key.
#[derive(Clone, PartialEq)]
pub struct Template {
    source: String,
    parsed: Result<Vec<Segment>, TemplateError>,
}

impl Template {
    /// Parse `source`
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = parse(&source);
        Self { source, parsed }
    }

    /// The template text as given
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parse error, if the template is malformed
    pub fn error(&self) -> Option<&TemplateError> {
        self.parsed.as_ref().err()
    }

    /// Substitute `args` into the template
    pub fn render(&self, args: &Args) -> Result<String, TemplateError> {
        let segments = self.parsed.as_ref().map_err(Clone::clone)?;
        let mut out = String::with_capacity(self.source.len());

        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = resolve(field, args)?;
                    write_value(&mut out, value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}

fn parse(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut numbering = None;
    let mut next_auto = 0;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut text = String::new();
                let mut in_item = false;
                let mut closed = false;

                for c in chars.by_ref() {
                    match c {
                        '[' => in_item = true,
                        ']' => in_item = false,
                        '}' if !in_item => {
                            closed = true;
                            break;
                        }
                        '{' if !in_item => return Err(TemplateError::Unsupported(text)),
                        _ => {}
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(TemplateError::UnmatchedOpen);
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let field = parse_field(text, &mut numbering, &mut next_auto)?;
                segments.push(Segment::Field(field));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedClose),
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_field(
    text: String,
    numbering: &mut Option<Numbering>,
    next_auto: &mut usize,
) -> Result<Field, TemplateError> {
    let mut in_item = false;
    let has_spec = text.chars().any(|c| {
        match c {
            '[' => in_item = true,
            ']' => in_item = false,
            ':' | '!' if !in_item => return true,
            _ => {}
        }
        false
    });
    if has_spec {
        return Err(TemplateError::Unsupported(text));
    }

    let root_end = text.find(['.', '[']).unwrap_or(text.len());
    let root_text = &text[..root_end];

    let root = if root_text.is_empty() {
        if *numbering == Some(Numbering::Manual) {
            return Err(TemplateError::MixedNumbering);
        }
        *numbering = Some(Numbering::Auto);
        let index = *next_auto;
        *next_auto += 1;
        Root::Index(index)
    } else if root_text.bytes().all(|b| b.is_ascii_digit()) {
        if *numbering == Some(Numbering::Auto) {
            return Err(TemplateError::MixedNumbering);
        }
        *numbering = Some(Numbering::Manual);
        let index = root_text
            .parse()
            .map_err(|_| TemplateError::Malformed(text.clone()))?;
        Root::Index(index)
    } else {
        Root::Name(root_text.to_string())
    };

    let path = parse_path(&text[root_end..]).ok_or_else(|| TemplateError::Malformed(text.clone()))?;

    Ok(Field { text, root, path })
}

fn parse_path(mut rest: &str) -> Option<Vec<Accessor>> {
    let mut path = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end == 0 {
                return None;
            }
            path.push(Accessor::Attr(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            if end == 0 {
                return None;
            }
            path.push(Accessor::Item(after[..end].to_string()));
            rest = &after[end + 1..];
        } else {
            // only '.' or '[' may follow ']'
            return None;
        }
    }
    Some(path)
}

fn resolve<'a>(field: &Field, args: &'a Args) -> Result<&'a Value, TemplateError> {
    let mut value = match &field.root {
        Root::Index(index) => args
            .get(*index)
            .ok_or(TemplateError::IndexOutOfRange(*index))?,
        Root::Name(name) => args
            .get_named(name)
            .ok_or_else(|| TemplateError::MissingNamed(name.clone()))?,
    };

    for accessor in &field.path {
        let next = match (accessor, value) {
            (Accessor::Attr(name), Value::Object(map)) => map.get(name),
            (Accessor::Item(item), Value::Object(map)) => map.get(item),
            (Accessor::Item(item), Value::Array(items)) => {
                item.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        };
        value = next.ok_or_else(|| TemplateError::MissingAttribute {
            field: field.text.clone(),
            part: match accessor {
                Accessor::Attr(part) | Accessor::Item(part) => part.clone(),
            },
        })?;
    }
    Ok(value)
}

/// Textual form of an argument inside a key
pub(crate) fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        composite => out.push_str(&composite.to_string()),
    }
}
