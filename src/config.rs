//! Compiler configuration: primitive table, rename tables, naming rules.
//!
//! A [`Config`] is built once and passed by reference to every pass, so two
//! compiles with different tables never interfere.

use std::collections::HashMap;

/// One row of the primitive table: description name, output identifier, wire width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveSpec {
    pub name: String,
    pub ident: String,
    pub width: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    primitives: Vec<PrimitiveSpec>,
    type_renames: HashMap<String, String>,
    name_renames: HashMap<String, String>,
    resource_width: u32,
}

const DEFAULT_PRIMITIVES: &[(&str, &str, u32)] = &[
    ("CARD8", "u8", 1),
    ("CARD16", "u16", 2),
    ("CARD32", "u32", 4),
    ("CARD64", "u64", 8),
    ("INT8", "i8", 1),
    ("INT16", "i16", 2),
    ("INT32", "i32", 4),
    ("INT64", "i64", 8),
    ("BYTE", "u8", 1),
    ("BOOL", "bool", 1),
    ("char", "u8", 1),
    ("void", "u8", 1),
    ("float", "f32", 4),
    ("double", "f64", 8),
];

const DEFAULT_TYPE_RENAMES: &[(&str, &str)] = &[
    ("VISUALTYPE", "VisualInfo"),
    ("DEPTH", "DepthInfo"),
    ("SCREEN", "ScreenInfo"),
    ("Setup", "SetupInfo"),
];

impl Default for Config {
    fn default() -> Self {
        Config {
            primitives: DEFAULT_PRIMITIVES
                .iter()
                .map(|&(name, ident, width)| PrimitiveSpec {
                    name: name.to_string(),
                    ident: ident.to_string(),
                    width,
                })
                .collect(),
            type_renames: DEFAULT_TYPE_RENAMES
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            name_renames: HashMap::new(),
            resource_width: 4,
        }
    }
}

impl Config {
    pub fn primitives(&self) -> &[PrimitiveSpec] {
        &self.primitives
    }

    pub fn primitive(&self, name: &str) -> Option<&PrimitiveSpec> {
        self.primitives.iter().find(|p| p.name == name)
    }

    /// Add a primitive, or replace the row with the same name.
    pub fn with_primitive(mut self, name: &str, ident: &str, width: u32) -> Self {
        let spec = PrimitiveSpec {
            name: name.to_string(),
            ident: ident.to_string(),
            width,
        };
        match self.primitives.iter_mut().find(|p| p.name == name) {
            Some(row) => *row = spec,
            None => self.primitives.push(spec),
        }
        self
    }

    pub fn with_type_rename(mut self, from: &str, to: &str) -> Self {
        self.type_renames.insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_name_rename(mut self, from: &str, to: &str) -> Self {
        self.name_renames.insert(from.to_string(), to.to_string());
        self
    }

    /// Wire width of an opaque resource handle.
    pub fn resource_width(&self) -> u32 {
        self.resource_width
    }

    /// Output identifier for a field, enum item, request or other value name.
    pub fn src_name(&self, name: &str) -> String {
        match self.name_renames.get(name) {
            Some(n) => n.clone(),
            None => split_and_title(name),
        }
    }

    /// Output identifier for a (non-primitive) type name.
    pub fn type_src_name(&self, name: &str) -> String {
        match self.type_renames.get(name) {
            Some(n) => n.clone(),
            None => split_and_title(name),
        }
    }
}

/// Name mangling: `WINDOW` -> `Window`, `value_mask` -> `ValueMask`, `timestamp` -> `Timestamp`.
/// Only a name made of upper-case letters and digits counts as all-caps; any
/// other name with underscores is split on them and the segments concatenated.
pub fn split_and_title(s: &str) -> String {
    if is_all_caps(s) {
        return title(&s.to_lowercase());
    }
    if !s.contains('_') {
        return title(s);
    }
    s.split('_').map(title).collect()
}

/// `[A-Z0-9]+`
fn is_all_caps(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Upper-case the first letter of every word. Letters, digits and `_` do not break words.
fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn split_and_title_rules() {
        assert_eq!(split_and_title("WINDOW"), "Window");
        assert_eq!(split_and_title("CARD8"), "Card8");
        assert_eq!(split_and_title("GRAB_MODE"), "GRABMODE");
        assert_eq!(split_and_title("Grab_mode"), "GrabMode");
        assert_eq!(split_and_title("value_mask"), "ValueMask");
        assert_eq!(split_and_title("timestamp"), "Timestamp");
        assert_eq!(split_and_title("KeyPress"), "KeyPress");
        assert_eq!(split_and_title(""), "");
    }

    #[test]
    fn primitive_table_has_no_orphans_or_duplicates() {
        let config = Config::default();
        let names: HashSet<&str> = config.primitives().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), config.primitives().len(), "duplicate primitive name");
        for p in config.primitives() {
            assert!(!p.ident.is_empty(), "{} has no identifier", p.name);
            assert!(p.width > 0, "{} has no width", p.name);
            assert_eq!(config.primitive(&p.name), Some(p));
        }
    }

    #[test]
    fn renames_override_mangling() {
        let config = Config::default().with_name_rename("string_len", "StrLen");
        assert_eq!(config.type_src_name("SCREEN"), "ScreenInfo");
        assert_eq!(config.type_src_name("WINDOW"), "Window");
        assert_eq!(config.src_name("string_len"), "StrLen");
        assert_eq!(config.src_name("odd_length"), "OddLength");
    }

    #[test]
    fn with_primitive_replaces_existing_row() {
        let config = Config::default().with_primitive("float", "f64", 4);
        assert_eq!(config.primitive("float").map(|p| p.ident.as_str()), Some("f64"));
        assert_eq!(config.primitives().len(), Config::default().primitives().len());
    }
}
