//! Placeholder templates for edition URLs and output filenames.
//!
//! Publishers encode the edition date in wildly different ways
//! (`2025-05-30.pdf`, `30052025en.pdf`, `HINDIMIL_HIN_20250530/page/3`), so
//! every URL and filename in the catalogue is a small template:
//!
//! ```text
//! https://westerntimesnews.in/wp-content/uploads/{date:%Y}/{date:%m}/{date:%d%m%Y}{code}.pdf
//! {pub}_{date:%Y%m%d}_{page:02}.{ext}
//! ```
//!
//! `{{` and `}}` produce literal braces. Which placeholders are legal depends
//! on the [`TemplateContext`]; an unknown or out-of-context name is rejected
//! when the catalogue is loaded rather than halfway through a run.

use crate::error::{HarvestError, Result};
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::Regex;

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[a-z]+)(?::(?P<arg>.+))?$").expect("static field regex")
});

/// Where a template is used, which decides the placeholders it may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateContext {
    Url,
    /// Same placeholders as [`TemplateContext::Url`], without percent-encoding.
    Text,
    EditionFile,
    PageFile,
    ArticleFile,
}

impl TemplateContext {
    fn allows(self, field: &Field) -> bool {
        use Field::*;
        match self {
            TemplateContext::Url | TemplateContext::Text => {
                matches!(field, Pub | Edition | Code | Date(_) | Page(_) | Value)
            }
            TemplateContext::EditionFile => matches!(field, Pub | Edition | Code | Date(_) | Ext),
            TemplateContext::PageFile => {
                matches!(field, Pub | Edition | Code | Date(_) | Ext | Page(_))
            }
            TemplateContext::ArticleFile => matches!(
                field,
                Pub | Edition | Code | Date(_) | Ext | Page(_) | Article(_)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Pub,
    Edition,
    Code,
    Date(Option<String>),
    Page(usize),
    Article(usize),
    Ext,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Values substituted into a [`Template`].
#[derive(Debug, Clone)]
pub struct Vars<'a> {
    pub publication: &'a str,
    pub edition: &'a str,
    pub code: &'a str,
    pub date: NaiveDate,
    pub page: Option<u32>,
    pub article: Option<u32>,
    pub ext: Option<&'a str>,
    pub value: Option<&'a str>,
}

impl<'a> Vars<'a> {
    pub fn new(publication: &'a str, edition: &'a str, code: &'a str, date: NaiveDate) -> Self {
        Self {
            publication,
            edition,
            code,
            date,
            page: None,
            article: None,
            ext: None,
            value: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_article(mut self, article: u32) -> Self {
        self.article = Some(article);
        self
    }

    pub fn with_ext(mut self, ext: &'a str) -> Self {
        self.ext = Some(ext);
        self
    }

    pub fn with_value(mut self, value: &'a str) -> Self {
        self.value = Some(value);
        self
    }
}

/// A parsed placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    context: TemplateContext,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, rejecting placeholders the `context` does not allow.
    pub fn parse(source: &str, context: TemplateContext) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        placeholder.push(inner);
                    }
                    if !closed {
                        return Err(HarvestError::Template(format!(
                            "unclosed placeholder in `{source}`"
                        )));
                    }
                    let field = parse_field(&placeholder, source)?;
                    if !context.allows(&field) {
                        return Err(HarvestError::Template(format!(
                            "placeholder `{{{placeholder}}}` is not allowed in {context:?} template `{source}`"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => {
                    return Err(HarvestError::Template(format!(
                        "unmatched `}}` in `{source}`"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            context,
            segments,
        })
    }

    /// Whether the template substitutes a page number.
    pub fn uses_page(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field(Field::Page(_))))
    }

    /// Substitute `vars` into the template.
    ///
    /// In URL templates the free-text values (`edition`, `code`, `value`) are
    /// percent-encoded unless they are already absolute URLs.
    pub fn render(&self, vars: &Vars<'_>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let rendered = match field {
                        Field::Pub => vars.publication.to_string(),
                        Field::Edition => self.free_text(vars.edition),
                        Field::Code => self.free_text(vars.code),
                        Field::Date(None) => vars.date.format("%Y-%m-%d").to_string(),
                        Field::Date(Some(fmt)) => vars.date.format(fmt).to_string(),
                        Field::Page(width) => {
                            let page = vars.page.ok_or_else(|| self.missing("page"))?;
                            format!("{page:0width$}", width = *width)
                        }
                        Field::Article(width) => {
                            let article = vars.article.ok_or_else(|| self.missing("article"))?;
                            format!("{article:0width$}", width = *width)
                        }
                        Field::Ext => vars.ext.ok_or_else(|| self.missing("ext"))?.to_string(),
                        Field::Value => {
                            self.free_text(vars.value.ok_or_else(|| self.missing("value"))?)
                        }
                    };
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    fn free_text(&self, text: &str) -> String {
        if self.context == TemplateContext::Url
            && !(text.starts_with("http://") || text.starts_with("https://"))
        {
            urlencoding::encode(text).into_owned()
        } else {
            text.to_string()
        }
    }

    fn missing(&self, name: &str) -> HarvestError {
        HarvestError::Template(format!("no value for `{{{name}}}` in `{}`", self.source))
    }
}

fn parse_field(placeholder: &str, source: &str) -> Result<Field> {
    let caps = FIELD_RE
        .captures(placeholder)
        .ok_or_else(|| HarvestError::Template(format!("bad placeholder `{{{placeholder}}}` in `{source}`")))?;
    let name = &caps["name"];
    let arg = caps.name("arg").map(|m| m.as_str());

    let field = match (name, arg) {
        ("pub", None) => Field::Pub,
        ("edition", None) => Field::Edition,
        ("code", None) => Field::Code,
        ("ext", None) => Field::Ext,
        ("value", None) => Field::Value,
        ("date", None) => Field::Date(None),
        ("date", Some(fmt)) => {
            if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                return Err(HarvestError::Template(format!(
                    "invalid date format `{fmt}` in `{source}`"
                )));
            }
            Field::Date(Some(fmt.to_string()))
        }
        ("page", width) => Field::Page(parse_width(width, placeholder, source)?),
        ("article", width) => Field::Article(parse_width(width, placeholder, source)?),
        _ => {
            return Err(HarvestError::Template(format!(
                "unknown placeholder `{{{placeholder}}}` in `{source}`"
            )));
        }
    };
    Ok(field)
}

fn parse_width(width: Option<&str>, placeholder: &str, source: &str) -> Result<usize> {
    match width {
        None => Ok(0),
        Some(w) => w.parse::<usize>().map_err(|_| {
            HarvestError::Template(format!("bad padding in `{{{placeholder}}}` in `{source}`"))
        }),
    }
}
