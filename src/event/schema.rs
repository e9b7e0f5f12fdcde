//! Schema registry: which attributes each event kind accepts
//!
//! The registry is built explicitly with [`SchemaRegistry::builtin`] and
//! shared behind an `Arc`; nothing here is global, so independent
//! interpreters can run side by side with their own registries.

use std::collections::HashMap;

use super::kind::{Capabilities, EventKind};

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Boolean,
}

/// How a kind's child nodes and text content are consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    /// Children are events; text is ignored
    Children,
    /// `arg` children become positional arguments
    Args,
    /// Text content becomes the `content` action
    RawText,
}

/// Attribute names and their value types, in declaration order
pub type AttrTable = Vec<(&'static str, AttrType)>;

/// Attribute table for one kind
#[derive(Debug, Clone)]
pub struct KindSchema {
    pub kind: EventKind,
    pub selectors: AttrTable,
    pub actions: AttrTable,
    pub content: ContentRule,
}

impl KindSchema {
    pub fn selector_type(&self, name: &str) -> Option<AttrType> {
        lookup(&self.selectors, name)
    }

    pub fn action_type(&self, name: &str) -> Option<AttrType> {
        lookup(&self.actions, name)
    }
}

fn lookup(table: &[(&'static str, AttrType)], name: &str) -> Option<AttrType> {
    table.iter().find(|(attr, _)| *attr == name).map(|(_, ty)| *ty)
}

use AttrType::{Boolean as B, String as S};

const ELEMENT_SELECTORS: &[(&str, AttrType)] = &[
    ("id", S),
    ("name", S),
    ("class", S),
    ("css", S),
    ("xpath", S),
    ("index", S),
    ("text", S),
    ("value", S),
    ("title", S),
];

const ELEMENT_ACTIONS: &[(&str, AttrType)] = &[
    ("exists", B),
    ("store", S),
    ("assert", S),
    ("assertnot", S),
    ("var", S),
    ("jscriptevent", S),
    ("click", B),
    ("alert", B),
    ("required", B),
];

const TEXT_INPUT_ACTIONS: &[(&str, AttrType)] =
    &[("disabled", B), ("clear", B), ("set", S), ("append", S)];

const TOGGLE_ACTIONS: &[(&str, AttrType)] = &[("disabled", B), ("set", B)];

const SELECT_ACTIONS: &[(&str, AttrType)] = &[("disabled", B), ("set", S), ("setreal", S)];

const FILEFIELD_ACTIONS: &[(&str, AttrType)] = &[("disabled", B), ("set", S)];

const FRAME_SELECTORS: &[(&str, AttrType)] =
    &[("index", S), ("id", S), ("name", S), ("xpath", S), ("css", S)];

/// Registry of every known kind and its attributes
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    kinds: HashMap<EventKind, KindSchema>,
    tags: HashMap<String, EventKind>,
}

impl SchemaRegistry {
    /// Build the registry of all built-in kinds
    pub fn builtin() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
            tags: HashMap::new(),
        };
        for kind in EventKind::ALL {
            registry.insert(builtin_schema(*kind));
        }
        registry
    }

    fn insert(&mut self, schema: KindSchema) {
        self.tags.insert(schema.kind.tag().to_string(), schema.kind);
        self.kinds.insert(schema.kind, schema);
    }

    /// Look up a kind by tag name, ignoring case
    pub fn kind_for_tag(&self, tag: &str) -> Option<EventKind> {
        self.tags.get(&tag.to_ascii_lowercase()).copied()
    }

    pub fn schema(&self, kind: EventKind) -> Option<&KindSchema> {
        self.kinds.get(&kind)
    }

    /// All schemas, sorted by tag
    pub fn schemas(&self) -> Vec<&KindSchema> {
        let mut all: Vec<_> = self.kinds.values().collect();
        all.sort_by_key(|s| s.kind.tag());
        all
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_schema(kind: EventKind) -> KindSchema {
    let caps = kind.capabilities();
    let content = if caps.contains(Capabilities::ARGS) {
        ContentRule::Args
    } else if caps.contains(Capabilities::RAW_TEXT) {
        ContentRule::RawText
    } else {
        ContentRule::Children
    };

    let (selectors, actions) = if caps.contains(Capabilities::NEEDS_ELEMENT) {
        element_attributes(kind)
    } else {
        command_attributes(kind)
    };

    KindSchema {
        kind,
        selectors,
        actions,
        content,
    }
}

fn element_attributes(kind: EventKind) -> (AttrTable, AttrTable) {
    let mut selectors = ELEMENT_SELECTORS.to_vec();
    match kind {
        EventKind::Link => selectors.push(("href", S)),
        EventKind::Image => selectors.extend([("src", S), ("alt", S)]),
        _ => {}
    }

    let extra: &[(&str, AttrType)] = if kind.is_text_input() {
        TEXT_INPUT_ACTIONS
    } else if kind.is_toggle() {
        TOGGLE_ACTIONS
    } else {
        match kind {
            EventKind::Select => SELECT_ACTIONS,
            EventKind::Filefield => FILEFIELD_ACTIONS,
            EventKind::Button => &[("disabled", B)],
            _ => &[],
        }
    };

    let mut actions = ELEMENT_ACTIONS.to_vec();
    actions.extend_from_slice(extra);
    (selectors, actions)
}

fn command_attributes(kind: EventKind) -> (AttrTable, AttrTable) {
    let (selectors, actions): (&[(&str, AttrType)], &[(&str, AttrType)]) = match kind {
        EventKind::Alert => (&[], &[("alert", B), ("exists", B), ("assert", S)]),
        EventKind::Attach => (&[("title", S), ("url", S), ("index", S)], &[]),
        EventKind::Browser => (
            &[],
            &[
                ("action", S),
                ("url", S),
                ("assert", S),
                ("assertnot", S),
                ("assertpage", B),
            ],
        ),
        EventKind::Csv => (&[], &[("file", S), ("var", S), ("override", S)]),
        EventKind::Delete => (&[], &[("name", S)]),
        EventKind::Dnd => (&[], &[("src", S), ("dst", S)]),
        EventKind::Frame => (FRAME_SELECTORS, &[("required", B)]),
        EventKind::Javaplugin | EventKind::Pluginloader => (&[], &[("classname", S)]),
        EventKind::Javascript => (&[], &[("file", S), ("content", S)]),
        EventKind::Puts => (&[], &[("txt", S)]),
        EventKind::Savehtml | EventKind::Screenshot | EventKind::Script => (&[], &[("file", S)]),
        EventKind::Var => (&[], &[("var", S), ("set", S), ("unset", B)]),
        EventKind::Wait => (&[], &[("timeout", S)]),
        EventKind::Whitelist => (&[], &[("name", S), ("action", S), ("content", S)]),
        _ => (&[], &[]),
    };
    (selectors.to_vec(), actions.to_vec())
}
