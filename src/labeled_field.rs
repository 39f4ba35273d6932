//! Labeled-field extraction from directory pages
//!
//! Directory detail pages show facts as a label element followed by a value
//! element. A [`LabeledField`] pairs the candidate label texts with a value
//! parser, so a new directory layout only needs new label/parser pairs.

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Node};

use crate::normalize::normalize_name;

/// Where the value sits relative to the label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLayout {
    /// Any following sibling element of the label's parent element
    FollowingSiblings,
    /// The next `td` after a `td` label cell
    AdjacentCell,
}

/// Raw sibling text together with its parsed value
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<T> {
    pub raw: String,
    pub value: T,
}

pub struct LabeledField<T> {
    name: &'static str,
    label: Regex,
    layout: LabelLayout,
    parser: fn(&str) -> Option<T>,
}

impl<T> LabeledField<T> {
    /// Build an extractor from candidate labels (matched case-insensitively as substrings)
    pub fn new(
        name: &'static str,
        labels: &[&str],
        layout: LabelLayout,
        parser: fn(&str) -> Option<T>,
    ) -> Result<Self, regex::Error> {
        let alternation = labels
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|");
        let label = RegexBuilder::new(&alternation).case_insensitive(true).build()?;

        Ok(Self {
            name,
            label,
            layout,
            parser,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Find the first label whose neighbouring value the parser accepts
    pub fn extract(&self, document: &Html) -> Option<FieldMatch<T>> {
        for node in document.tree.root().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            if !self.label.is_match(text) {
                continue;
            }
            let Some(label_element) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };

            let found = match self.layout {
                LabelLayout::FollowingSiblings => self.scan_siblings(label_element),
                LabelLayout::AdjacentCell => self.adjacent_cell(label_element),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn scan_siblings(&self, label_element: ElementRef<'_>) -> Option<FieldMatch<T>> {
        label_element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find_map(|sibling| self.try_parse(sibling))
    }

    fn adjacent_cell(&self, label_element: ElementRef<'_>) -> Option<FieldMatch<T>> {
        if label_element.value().name() != "td" {
            return None;
        }
        let cell = label_element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "td")?;
        self.try_parse(cell)
    }

    fn try_parse(&self, element: ElementRef<'_>) -> Option<FieldMatch<T>> {
        let raw = normalize_name(&element.text().collect::<Vec<_>>().join(" "));
        if raw.is_empty() {
            return None;
        }
        let value = (self.parser)(&raw)?;
        Some(FieldMatch { raw, value })
    }
}

impl<T> std::fmt::Debug for LabeledField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabeledField")
            .field("name", &self.name)
            .field("label", &self.label.as_str())
            .field("layout", &self.layout)
            .finish()
    }
}
