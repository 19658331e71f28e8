//! Validation message catalog.
//!
//! A static table keyed by rule name. Each entry is either a fixed string
//! or a template rendered from the failing constraint's parameters.
//!
//! | Rule | Message |
//! |------|---------|
//! | `required` | This field is required |
//! | `type` | should be "{expected}". |
//! | `minLength` / `maxLength` | should NOT be shorter/longer than {n} characters |
//! | `min` / `max` | should be >= / <= {n} |
//! | `multipleOf` | should be multiple of {n} |
//! | `exclusiveMinimum` / `exclusiveMaximum` | should be > / < {n} |
//! | `minItems` / `maxItems` | should NOT have fewer/more than {n} items |
//! | `uniqueItems` | should NOT have duplicate items |
//! | `const` | should be equal to constant "{value}" |

use std::collections::BTreeMap;

use serde_json::{Number, Value};

/// A violated constraint together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Type { expected: String },
    MinLength(u64),
    MaxLength(u64),
    Minimum(Number),
    Maximum(Number),
    MultipleOf(Number),
    ExclusiveMinimum(Number),
    ExclusiveMaximum(Number),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Const(Value),
}

impl Rule {
    /// Catalog key for this rule.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Type { .. } => "type",
            Rule::MinLength(_) => "minLength",
            Rule::MaxLength(_) => "maxLength",
            Rule::Minimum(_) => "min",
            Rule::Maximum(_) => "max",
            Rule::MultipleOf(_) => "multipleOf",
            Rule::ExclusiveMinimum(_) => "exclusiveMinimum",
            Rule::ExclusiveMaximum(_) => "exclusiveMaximum",
            Rule::MinItems(_) => "minItems",
            Rule::MaxItems(_) => "maxItems",
            Rule::UniqueItems => "uniqueItems",
            Rule::Const(_) => "const",
        }
    }
}

/// One catalog entry.
#[derive(Clone, Copy)]
pub enum Message {
    Fixed(&'static str),
    Template(fn(&Rule) -> String),
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Fixed(s) => f.debug_tuple("Fixed").field(s).finish(),
            Message::Template(_) => f.write_str("Template(..)"),
        }
    }
}

const STANDARD: &[(&str, Message)] = &[
    ("required", Message::Fixed("This field is required")),
    ("type", Message::Template(type_message)),
    ("minLength", Message::Template(min_length_message)),
    ("maxLength", Message::Template(max_length_message)),
    ("min", Message::Template(min_message)),
    ("max", Message::Template(max_message)),
    ("multipleOf", Message::Template(multiple_of_message)),
    ("exclusiveMinimum", Message::Template(exclusive_minimum_message)),
    ("exclusiveMaximum", Message::Template(exclusive_maximum_message)),
    ("minItems", Message::Template(min_items_message)),
    ("maxItems", Message::Template(max_items_message)),
    ("uniqueItems", Message::Fixed("should NOT have duplicate items")),
    ("const", Message::Template(const_message)),
];

/// Rule-name keyed message table.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    entries: BTreeMap<&'static str, Message>,
}

impl MessageCatalog {
    /// The built-in English catalog.
    pub fn standard() -> Self {
        Self {
            entries: STANDARD.iter().copied().collect(),
        }
    }

    /// Replace or add the entry for `rule`.
    pub fn with(mut self, rule: &'static str, message: Message) -> Self {
        self.entries.insert(rule, message);
        self
    }

    pub fn get(&self, rule: &str) -> Option<Message> {
        self.entries.get(rule).copied()
    }

    /// Render the message for a violated rule.
    pub fn render(&self, rule: &Rule) -> String {
        match self.entries.get(rule.name()) {
            Some(Message::Fixed(s)) => (*s).to_string(),
            Some(Message::Template(f)) => f(rule),
            None => format!("violates {}", rule.name()),
        }
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn type_message(rule: &Rule) -> String {
    match rule {
        Rule::Type { expected } => format!("should be \"{}\".", expected),
        other => mismatched(other),
    }
}

fn min_length_message(rule: &Rule) -> String {
    match rule {
        Rule::MinLength(n) => format!("should NOT be shorter than {} characters", n),
        other => mismatched(other),
    }
}

fn max_length_message(rule: &Rule) -> String {
    match rule {
        Rule::MaxLength(n) => format!("should NOT be longer than {} characters", n),
        other => mismatched(other),
    }
}

fn min_message(rule: &Rule) -> String {
    match rule {
        Rule::Minimum(n) => format!("should be >= {}", n),
        other => mismatched(other),
    }
}

fn max_message(rule: &Rule) -> String {
    match rule {
        Rule::Maximum(n) => format!("should be <= {}", n),
        other => mismatched(other),
    }
}

fn multiple_of_message(rule: &Rule) -> String {
    match rule {
        Rule::MultipleOf(n) => format!("should be multiple of {}", n),
        other => mismatched(other),
    }
}

fn exclusive_minimum_message(rule: &Rule) -> String {
    match rule {
        Rule::ExclusiveMinimum(n) => format!("should be > {}", n),
        other => mismatched(other),
    }
}

fn exclusive_maximum_message(rule: &Rule) -> String {
    match rule {
        Rule::ExclusiveMaximum(n) => format!("should be < {}", n),
        other => mismatched(other),
    }
}

fn min_items_message(rule: &Rule) -> String {
    match rule {
        Rule::MinItems(n) => format!("should NOT have fewer than {} items", n),
        other => mismatched(other),
    }
}

fn max_items_message(rule: &Rule) -> String {
    match rule {
        Rule::MaxItems(n) => format!("should NOT have more than {} items", n),
        other => mismatched(other),
    }
}

fn const_message(rule: &Rule) -> String {
    match rule {
        Rule::Const(Value::String(s)) => format!("should be equal to constant \"{}\"", s),
        Rule::Const(v) => format!("should be equal to constant \"{}\"", v),
        other => mismatched(other),
    }
}

// A template registered under another rule's name.
fn mismatched(rule: &Rule) -> String {
    format!("violates {}", rule.name())
}
