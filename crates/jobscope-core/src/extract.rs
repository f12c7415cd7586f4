//! Declarative field extraction.
//!
//! A [`PageExtractor`] is a list of `(FieldId, FieldSpec)` pairs evaluated
//! against a parsed document. Evaluation never fails: a field either yields
//! [`Extracted::Present`] or an [`Extracted::Absent`] saying whether the
//! selector matched nothing or the matched content could not be read.
//! Every key and value is trimmed before it is stored.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;
use crate::models::{Absence, Breakout, Extracted, FieldId, FieldKind, Value};

/// Parse a CSS selector, mapping failures to [`AppError::InvalidSelector`].
pub fn parse_selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::InvalidSelector(format!("{css}: {e}")))
}

/// What to read from a matched node.
#[derive(Debug, Clone)]
pub enum Capture {
    /// All descendant text, concatenated.
    Text,
    /// The value of the named attribute.
    Attr(String),
}

/// Which node to use when a selector matches several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    First,
    Last,
}

/// Locates a node relative to a scope element and reads one string from it.
#[derive(Debug, Clone)]
pub struct Probe {
    /// `None` reads from the scope element itself.
    selector: Option<Selector>,
    capture: Capture,
    pick: Pick,
}

impl Probe {
    pub fn text(css: &str) -> Result<Self, AppError> {
        Ok(Self {
            selector: Some(parse_selector(css)?),
            capture: Capture::Text,
            pick: Pick::First,
        })
    }

    pub fn attr(css: &str, attr: &str) -> Result<Self, AppError> {
        Ok(Self {
            selector: Some(parse_selector(css)?),
            capture: Capture::Attr(attr.to_string()),
            pick: Pick::First,
        })
    }

    /// Read the text of the scope element itself.
    pub fn own_text() -> Self {
        Self {
            selector: None,
            capture: Capture::Text,
            pick: Pick::First,
        }
    }

    /// Use the last match instead of the first.
    pub fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }

    pub fn eval(&self, scope: ElementRef<'_>) -> Extracted<String> {
        let node = match &self.selector {
            None => Some(scope),
            Some(selector) => match self.pick {
                Pick::First => scope.select(selector).next(),
                Pick::Last => scope.select(selector).last(),
            },
        };
        let Some(node) = node else {
            return Extracted::Absent(Absence::NoMatch);
        };

        match &self.capture {
            Capture::Text => Extracted::Present(node.text().collect::<String>().trim().to_string()),
            Capture::Attr(name) => match node.value().attr(name) {
                Some(value) => Extracted::Present(value.trim().to_string()),
                None => Extracted::Absent(Absence::Unparsable(format!(
                    "matched node has no '{name}' attribute"
                ))),
            },
        }
    }
}

/// Restricts a breakout to blocks whose heading text equals `title`.
#[derive(Debug, Clone)]
pub struct Section {
    blocks: Selector,
    heading: Selector,
    title: String,
}

impl Section {
    fn matches(&self, block: ElementRef<'_>) -> bool {
        block
            .select(&self.heading)
            .next()
            .is_some_and(|h| h.text().collect::<String>().trim() == self.title)
    }
}

/// Builds a key → value mapping from a repeated markup block.
#[derive(Debug, Clone)]
pub struct BreakoutSpec {
    section: Option<Section>,
    items: Selector,
    key: Probe,
    value: Probe,
}

impl BreakoutSpec {
    pub fn new(items: &str, key: Probe, value: Probe) -> Result<Self, AppError> {
        Ok(Self {
            section: None,
            items: parse_selector(items)?,
            key,
            value,
        })
    }

    /// Only look inside `blocks` whose first `heading` reads `title`.
    pub fn within(mut self, blocks: &str, heading: &str, title: &str) -> Result<Self, AppError> {
        self.section = Some(Section {
            blocks: parse_selector(blocks)?,
            heading: parse_selector(heading)?,
            title: title.trim().to_string(),
        });
        Ok(self)
    }

    pub fn eval(&self, root: ElementRef<'_>) -> Extracted<Breakout> {
        let scopes: Vec<ElementRef<'_>> = match &self.section {
            None => vec![root],
            Some(section) => root
                .select(&section.blocks)
                .filter(|block| section.matches(*block))
                .collect(),
        };

        let mut matched = false;
        let mut map = Breakout::new();
        for item in scopes.iter().flat_map(|scope| scope.select(&self.items)) {
            matched = true;
            let Extracted::Present(key) = self.key.eval(item) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let value = match self.value.eval(item) {
                Extracted::Present(value) => value,
                Extracted::Absent(_) => String::new(),
            };
            map.insert(key, value);
        }

        if matched {
            Extracted::Present(map)
        } else {
            Extracted::Absent(Absence::NoMatch)
        }
    }
}

/// Turns a free-text summary into a breakout by anchor slicing.
///
/// The text between the first `start` anchor and the last `end` anchor is
/// split on `separator`; each item is split once on `label` into
/// `(key, value)`. Items without the label are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRule {
    pub start: String,
    pub end: String,
    pub separator: String,
    pub label: String,
}

impl SliceRule {
    pub fn new(start: &str, end: &str, separator: &str, label: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            separator: separator.to_string(),
            label: label.to_string(),
        }
    }

    pub fn apply(&self, text: &str) -> Extracted<Breakout> {
        let text = text.trim();
        if text.is_empty() {
            return Extracted::Absent(Absence::NoMatch);
        }
        let Some(from) = text.find(self.start.as_str()).map(|i| i + self.start.len()) else {
            return Extracted::Absent(Absence::Unparsable(format!(
                "start anchor '{}' not found",
                self.start
            )));
        };
        let Some(to) = text.rfind(self.end.as_str()).filter(|&to| to >= from) else {
            return Extracted::Absent(Absence::Unparsable(format!(
                "end anchor '{}' not found after start anchor",
                self.end
            )));
        };

        let map = text[from..to]
            .split(self.separator.as_str())
            .filter_map(|item| item.split_once(self.label.as_str()))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Extracted::Present(map)
    }
}

/// How one field is located and read.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    Scalar(Probe),
    Breakout(BreakoutSpec),
    Sliced { source: Probe, rule: SliceRule },
}

impl FieldSpec {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldSpec::Scalar(_) => FieldKind::Scalar,
            FieldSpec::Breakout(_) | FieldSpec::Sliced { .. } => FieldKind::Breakout,
        }
    }

    pub fn eval(&self, root: ElementRef<'_>) -> Extracted<Value> {
        match self {
            FieldSpec::Scalar(probe) => probe.eval(root).map(Value::Scalar),
            FieldSpec::Breakout(spec) => spec.eval(root).map(Value::Breakout),
            FieldSpec::Sliced { source, rule } => match source.eval(root) {
                Extracted::Present(text) => rule.apply(&text).map(Value::Breakout),
                Extracted::Absent(absence) => Extracted::Absent(absence),
            },
        }
    }
}

/// Evaluate every spec against `document`.
pub fn extract(
    document: &Html,
    specs: &[(FieldId, FieldSpec)],
) -> BTreeMap<FieldId, Extracted<Value>> {
    let root = document.root_element();
    specs
        .iter()
        .map(|(field, spec)| (*field, spec.eval(root)))
        .collect()
}

/// Result of running a [`PageExtractor`] over one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtract {
    /// The entity name as the page itself spells it, if found.
    pub page_name: Option<String>,
    pub fields: BTreeMap<FieldId, Extracted<Value>>,
}

/// The extraction routine for one page family.
#[derive(Debug, Clone, Default)]
pub struct PageExtractor {
    name: Option<Probe>,
    specs: Vec<(FieldId, FieldSpec)>,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe for the page's canonical entity name.
    pub fn with_name(mut self, probe: Probe) -> Self {
        self.name = Some(probe);
        self
    }

    /// Register a field. The spec must produce the shape the field holds.
    pub fn field(mut self, field: FieldId, spec: FieldSpec) -> Result<Self, AppError> {
        if spec.kind() != field.kind() {
            return Err(AppError::ConfigError(format!(
                "field '{field}' holds {:?} values but its spec produces {:?}",
                field.kind(),
                spec.kind()
            )));
        }
        if self.owns(field) {
            return Err(AppError::ConfigError(format!(
                "field '{field}' registered twice"
            )));
        }
        self.specs.push((field, spec));
        Ok(self)
    }

    pub fn owns(&self, field: FieldId) -> bool {
        self.specs.iter().any(|(f, _)| *f == field)
    }

    pub fn extract(&self, document: &Html) -> PageExtract {
        let page_name = self
            .name
            .as_ref()
            .and_then(|probe| probe.eval(document.root_element()).present().cloned())
            .filter(|name| !name.is_empty());
        PageExtract {
            page_name,
            fields: extract(document, &self.specs),
        }
    }

    /// Parse `html` and extract. The parsed document does not outlive the call.
    pub fn extract_html(&self, html: &str) -> PageExtract {
        self.extract(&Html::parse_document(html))
    }
}
