//! Event kinds and their static properties
//!
//! Every tag a test script may use is one [`EventKind`]. The table below is
//! the single place where a kind's tag, category, implicit HTML target and
//! capability flags are declared.

use bitflags::bitflags;
use std::fmt;

/// Broad grouping of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Interpreter commands that do not target a page element
    Command,
    /// Inert markup located on the page (div, span, table cells, ...)
    Markup,
    /// Interactive form controls
    Form,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Markup => write!(f, "markup"),
            Self::Form => write!(f, "form"),
        }
    }
}

bitflags! {
    /// What the interpreter does with a kind beyond its actions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Must resolve an on-page element before acting
        const NEEDS_ELEMENT = 1;
        /// `set` is a selected/deselected state
        const TOGGLE = 1 << 1;
        /// Accepts text through `set`/`append`/`clear`
        const TEXT_INPUT = 1 << 2;
        /// Collects `arg` children as positional arguments
        const ARGS = 1 << 3;
        /// Keeps its raw text content as the `content` action
        const RAW_TEXT = 1 << 4;
        /// Runs its own children (the loop must not recurse into them)
        const OWNS_CHILDREN = 1 << 5;
        /// Switches browser context that must be restored after children
        const RESTORES_CONTEXT = 1 << 6;
    }
}

/// The HTML element a kind targets: `html_tag` plus optional `html_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlTarget {
    pub tag: &'static str,
    pub input_type: Option<&'static str>,
}

macro_rules! event_kinds {
    ($( $variant:ident => $tag:literal, $category:ident, $html:expr, $input:expr, [$($cap:ident),*]; )+) => {
        /// Every event kind known to the interpreter
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $($variant),+
        }

        impl EventKind {
            /// All kinds, in declaration order
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),+];

            /// Tag name used in scripts
            pub fn tag(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $tag),+
                }
            }

            pub fn category(self) -> Category {
                match self {
                    $(EventKind::$variant => Category::$category),+
                }
            }

            /// The HTML element this kind targets, if any
            pub fn html_target(self) -> Option<HtmlTarget> {
                let (tag, input_type): (Option<&'static str>, Option<&'static str>) = match self {
                    $(EventKind::$variant => ($html, $input)),+
                };
                tag.map(|tag| HtmlTarget { tag, input_type })
            }

            pub fn capabilities(self) -> Capabilities {
                match self {
                    $(EventKind::$variant => Capabilities::empty()$(.union(Capabilities::$cap))*),+
                }
            }
        }
    };
}

event_kinds! {
    // Interpreter commands
    Alert => "alert", Command, None, None, [];
    Arg => "arg", Command, None, None, [];
    Attach => "attach", Command, None, None, [RESTORES_CONTEXT];
    Browser => "browser", Command, None, None, [];
    Csv => "csv", Command, None, None, [OWNS_CHILDREN];
    Delete => "delete", Command, None, None, [];
    Dnd => "dnd", Command, None, None, [];
    Execute => "execute", Command, None, None, [ARGS];
    Javaplugin => "javaplugin", Command, None, None, [ARGS];
    Javascript => "javascript", Command, None, None, [RAW_TEXT];
    Pluginloader => "pluginloader", Command, None, None, [];
    Puts => "puts", Command, None, None, [];
    Savehtml => "savehtml", Command, None, None, [];
    Screenshot => "screenshot", Command, None, None, [];
    Script => "script", Command, None, None, [];
    Timestamp => "timestamp", Command, None, None, [];
    Var => "var", Command, None, None, [];
    Wait => "wait", Command, None, None, [];
    Whitelist => "whitelist", Command, None, None, [RAW_TEXT];

    // Markup
    Abbr => "abbr", Markup, Some("abbr"), None, [NEEDS_ELEMENT];
    Acronym => "acronym", Markup, Some("acronym"), None, [NEEDS_ELEMENT];
    Address => "address", Markup, Some("address"), None, [NEEDS_ELEMENT];
    Area => "area", Markup, Some("area"), None, [NEEDS_ELEMENT];
    B => "b", Markup, Some("b"), None, [NEEDS_ELEMENT];
    Big => "big", Markup, Some("big"), None, [NEEDS_ELEMENT];
    Blockquote => "blockquote", Markup, Some("blockquote"), None, [NEEDS_ELEMENT];
    Br => "br", Markup, Some("br"), None, [NEEDS_ELEMENT];
    Caption => "caption", Markup, Some("caption"), None, [NEEDS_ELEMENT];
    Cite => "cite", Markup, Some("cite"), None, [NEEDS_ELEMENT];
    Code => "code", Markup, Some("code"), None, [NEEDS_ELEMENT];
    Col => "col", Markup, Some("col"), None, [NEEDS_ELEMENT];
    Colgroup => "colgroup", Markup, Some("colgroup"), None, [NEEDS_ELEMENT];
    Dd => "dd", Markup, Some("dd"), None, [NEEDS_ELEMENT];
    Del => "del", Markup, Some("del"), None, [NEEDS_ELEMENT];
    Dfn => "dfn", Markup, Some("dfn"), None, [NEEDS_ELEMENT];
    Div => "div", Markup, Some("div"), None, [NEEDS_ELEMENT];
    Dl => "dl", Markup, Some("dl"), None, [NEEDS_ELEMENT];
    Dt => "dt", Markup, Some("dt"), None, [NEEDS_ELEMENT];
    Em => "em", Markup, Some("em"), None, [NEEDS_ELEMENT];
    Form => "form", Markup, Some("form"), None, [NEEDS_ELEMENT];
    Frame => "frame", Markup, Some("iframe"), None, [RESTORES_CONTEXT];
    H1 => "h1", Markup, Some("h1"), None, [NEEDS_ELEMENT];
    H2 => "h2", Markup, Some("h2"), None, [NEEDS_ELEMENT];
    H3 => "h3", Markup, Some("h3"), None, [NEEDS_ELEMENT];
    H4 => "h4", Markup, Some("h4"), None, [NEEDS_ELEMENT];
    H5 => "h5", Markup, Some("h5"), None, [NEEDS_ELEMENT];
    H6 => "h6", Markup, Some("h6"), None, [NEEDS_ELEMENT];
    Hr => "hr", Markup, Some("hr"), None, [NEEDS_ELEMENT];
    I => "i", Markup, Some("i"), None, [NEEDS_ELEMENT];
    Image => "image", Markup, Some("img"), None, [NEEDS_ELEMENT];
    Ins => "ins", Markup, Some("ins"), None, [NEEDS_ELEMENT];
    Kbd => "kbd", Markup, Some("kbd"), None, [NEEDS_ELEMENT];
    Label => "label", Markup, Some("label"), None, [NEEDS_ELEMENT];
    Li => "li", Markup, Some("li"), None, [NEEDS_ELEMENT];
    Link => "link", Markup, Some("a"), None, [NEEDS_ELEMENT];
    Map => "map", Markup, Some("map"), None, [NEEDS_ELEMENT];
    Object => "object", Markup, Some("object"), None, [NEEDS_ELEMENT];
    Ol => "ol", Markup, Some("ol"), None, [NEEDS_ELEMENT];
    P => "p", Markup, Some("p"), None, [NEEDS_ELEMENT];
    Pre => "pre", Markup, Some("pre"), None, [NEEDS_ELEMENT];
    Q => "q", Markup, Some("q"), None, [NEEDS_ELEMENT];
    S => "s", Markup, Some("s"), None, [NEEDS_ELEMENT];
    Samp => "samp", Markup, Some("samp"), None, [NEEDS_ELEMENT];
    Small => "small", Markup, Some("small"), None, [NEEDS_ELEMENT];
    Span => "span", Markup, Some("span"), None, [NEEDS_ELEMENT];
    Strike => "strike", Markup, Some("strike"), None, [NEEDS_ELEMENT];
    Strong => "strong", Markup, Some("strong"), None, [NEEDS_ELEMENT];
    Sub => "sub", Markup, Some("sub"), None, [NEEDS_ELEMENT];
    Sup => "sup", Markup, Some("sup"), None, [NEEDS_ELEMENT];
    Table => "table", Markup, Some("table"), None, [NEEDS_ELEMENT];
    Tbody => "tbody", Markup, Some("tbody"), None, [NEEDS_ELEMENT];
    Td => "td", Markup, Some("td"), None, [NEEDS_ELEMENT];
    Tfoot => "tfoot", Markup, Some("tfoot"), None, [NEEDS_ELEMENT];
    Th => "th", Markup, Some("th"), None, [NEEDS_ELEMENT];
    Thead => "thead", Markup, Some("thead"), None, [NEEDS_ELEMENT];
    Tr => "tr", Markup, Some("tr"), None, [NEEDS_ELEMENT];
    Tt => "tt", Markup, Some("tt"), None, [NEEDS_ELEMENT];
    U => "u", Markup, Some("u"), None, [NEEDS_ELEMENT];
    Ul => "ul", Markup, Some("ul"), None, [NEEDS_ELEMENT];

    // Form controls
    Button => "button", Form, Some("button"), None, [NEEDS_ELEMENT];
    Checkbox => "checkbox", Form, Some("input"), Some("checkbox"), [NEEDS_ELEMENT, TOGGLE];
    Email => "email", Form, Some("input"), Some("email"), [NEEDS_ELEMENT, TEXT_INPUT];
    Filefield => "filefield", Form, Some("input"), Some("file"), [NEEDS_ELEMENT];
    Hidden => "hidden", Form, Some("input"), Some("hidden"), [NEEDS_ELEMENT, TEXT_INPUT];
    Input => "input", Form, Some("input"), None, [NEEDS_ELEMENT, TEXT_INPUT];
    Password => "password", Form, Some("input"), Some("password"), [NEEDS_ELEMENT, TEXT_INPUT];
    Radio => "radio", Form, Some("input"), Some("radio"), [NEEDS_ELEMENT, TOGGLE];
    Select => "select", Form, Some("select"), None, [NEEDS_ELEMENT];
    Textarea => "textarea", Form, Some("textarea"), None, [NEEDS_ELEMENT, TEXT_INPUT];
    Textfield => "textfield", Form, Some("input"), Some("text"), [NEEDS_ELEMENT, TEXT_INPUT];
}

impl EventKind {
    pub fn needs_element(self) -> bool {
        self.capabilities().contains(Capabilities::NEEDS_ELEMENT)
    }

    pub fn is_toggle(self) -> bool {
        self.capabilities().contains(Capabilities::TOGGLE)
    }

    pub fn is_text_input(self) -> bool {
        self.capabilities().contains(Capabilities::TEXT_INPUT)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique_and_lowercase() {
        let mut seen = HashSet::new();
        for kind in EventKind::ALL {
            let tag = kind.tag();
            assert_eq!(tag, tag.to_lowercase());
            assert!(seen.insert(tag), "duplicate tag {}", tag);
        }
        assert!(EventKind::ALL.len() >= 80);
    }

    #[test]
    fn test_commands_have_no_html_target() {
        for kind in EventKind::ALL {
            if kind.category() == Category::Command {
                assert!(kind.html_target().is_none(), "{} has a target", kind);
                assert!(!kind.needs_element());
            } else {
                assert!(kind.html_target().is_some(), "{} has no target", kind);
            }
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(EventKind::Checkbox.is_toggle());
        assert!(EventKind::Radio.needs_element());
        assert!(EventKind::Textfield.is_text_input());
        assert!(!EventKind::Button.is_text_input());
        assert!(EventKind::Csv.capabilities().contains(Capabilities::OWNS_CHILDREN));
        assert!(EventKind::Frame.capabilities().contains(Capabilities::RESTORES_CONTEXT));
        assert!(EventKind::Execute.capabilities().contains(Capabilities::ARGS));
        assert!(EventKind::Whitelist.capabilities().contains(Capabilities::RAW_TEXT));
    }

    #[test]
    fn test_typed_inputs() {
        let target = EventKind::Password.html_target().unwrap();
        assert_eq!(target.tag, "input");
        assert_eq!(target.input_type, Some("password"));
        assert_eq!(EventKind::Link.html_target().unwrap().tag, "a");
        assert_eq!(EventKind::Div.html_target().unwrap().input_type, None);
    }
}
