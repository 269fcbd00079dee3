//! Typed intermediate representation.
//!
//! The same node types describe two stages of the pipeline. Between translation
//! and resolution every type reference is a [`Placeholder`] and every name is the
//! raw description name ([`Unresolved`]). After resolution, references are arena
//! ids and names carry their output identifier ([`Resolved`]). Code that needs
//! resolved data takes `Module<Resolved>`, so an unresolved tree can never reach
//! layout or emission.
//!
//! Modules live in a flat arena ([`ModuleSet`]) and refer to each other and to
//! types by id, so a module and the modules it imports never own each other.

use std::fmt;

use crate::expr::Expr;
use crate::raw::FieldHints;

/// Selects the representation of names and type references.
pub trait Stage: Clone + Copy + fmt::Debug + PartialEq {
    type Name: Clone + fmt::Debug + PartialEq;
    type TypeRef: Clone + fmt::Debug + PartialEq;

    /// Name as written in the description.
    fn xml_name(name: &Self::Name) -> &str;
    /// Name used when rendering expressions.
    fn display_name(name: &Self::Name) -> &str;
    /// Type reference used when rendering expressions.
    fn display_ref(r: &Self::TypeRef) -> &str;
}

/// Translator output: names are raw, references are placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved;

/// Resolver output: names carry identifiers, references are ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved;

impl Stage for Unresolved {
    type Name = String;
    type TypeRef = Placeholder;

    fn xml_name(name: &String) -> &str {
        name
    }

    fn display_name(name: &String) -> &str {
        name
    }

    fn display_ref(r: &Placeholder) -> &str {
        &r.name
    }
}

impl Stage for Resolved {
    type Name = Ident;
    type TypeRef = TypeRef;

    fn xml_name(name: &Ident) -> &str {
        &name.xml
    }

    fn display_name(name: &Ident) -> &str {
        &name.src
    }

    fn display_ref(r: &TypeRef) -> &str {
        &r.ident
    }
}

/// An unresolved reference to a type by name, optionally `namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
}

impl Placeholder {
    pub fn new(name: impl Into<String>) -> Self {
        Placeholder { name: name.into() }
    }

    /// Split off the namespace prefix, if any.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.name.split_once(':') {
            Some((ns, rest)) => (Some(ns), rest),
            None => (None, &self.name),
        }
    }
}

/// A resolved name: the description name and its output identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub xml: String,
    pub src: String,
}

impl Ident {
    pub fn new(xml: impl Into<String>, src: impl Into<String>) -> Self {
        Ident {
            xml: xml.into(),
            src: src.into(),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.src)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId {
    pub module: ModuleId,
    pub index: usize,
}

/// A resolved type reference: the target id and the identifier to use for it
/// from the referencing module (qualified when the target lives elsewhere).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub id: TypeId,
    pub ident: String,
}

/// One protocol module: a namespace of types and requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Module<S: Stage> {
    pub name: String,
    /// The module that first imported this one.
    pub parent: Option<ModuleId>,
    pub extension_xname: Option<String>,
    pub extension_name: Option<String>,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
    pub imports: Vec<ModuleId>,
    pub types: Vec<Type<S>>,
    pub requests: Vec<Request<S>>,
}

/// Name of the core protocol module; every other module is an extension.
pub const CORE_MODULE: &str = "xproto";

impl<S: Stage> Module<S> {
    pub fn is_extension(&self) -> bool {
        !self.name.eq_ignore_ascii_case(CORE_MODULE)
    }

    /// Package name used to qualify identifiers from other modules.
    pub fn package(&self) -> String {
        self.name.replace('_', "")
    }

    pub fn find_type(&self, xml_name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.xml_name() == xml_name)
    }
}

/// Arena of modules in dependency order: every import precedes its importers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSet<S: Stage = Resolved> {
    pub modules: Vec<Module<S>>,
    pub root: ModuleId,
}

pub type Translated = ModuleSet<Unresolved>;

impl<S: Stage> ModuleSet<S> {
    pub fn module(&self, id: ModuleId) -> &Module<S> {
        &self.modules[id.0]
    }

    pub fn root_module(&self) -> &Module<S> {
        self.module(self.root)
    }

    pub fn get(&self, id: TypeId) -> &Type<S> {
        &self.modules[id.module.0].types[id.index]
    }

    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    /// Module whose name matches, compared without case.
    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name.eq_ignore_ascii_case(name))
            .map(ModuleId)
    }
}

impl ModuleSet<Resolved> {
    /// Type behind a reference, following aliases to the underlying definition.
    /// Resolution rejects alias cycles; on a hand-built cycle this stops at an alias.
    pub fn underlying(&self, r: &TypeRef) -> &Type<Resolved> {
        let limit: usize = self.modules.iter().map(|m| m.types.len()).sum();
        let mut ty = self.get(r.id);
        for _ in 0..limit {
            match ty {
                Type::Alias(a) => ty = self.get(a.old.id),
                _ => break,
            }
        }
        ty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type<S: Stage> {
    Primitive(Primitive<S>),
    Enum(EnumType<S>),
    Resource(Resource<S>),
    Alias(Alias<S>),
    Struct(StructType<S>),
    Union(StructType<S>),
    Event(Event<S>),
    EventAlias(CopyType<S>),
    Error(ErrorType<S>),
    ErrorAlias(CopyType<S>),
}

impl<S: Stage> Type<S> {
    pub fn name(&self) -> &S::Name {
        match self {
            Type::Primitive(t) => &t.name,
            Type::Enum(t) => &t.name,
            Type::Resource(t) => &t.name,
            Type::Alias(t) => &t.name,
            Type::Struct(t) | Type::Union(t) => &t.name,
            Type::Event(t) => &t.name,
            Type::Error(t) => &t.name,
            Type::EventAlias(t) | Type::ErrorAlias(t) => &t.name,
        }
    }

    pub fn xml_name(&self) -> &str {
        S::xml_name(self.name())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Type::Primitive(_) => "primitive",
            Type::Enum(_) => "enum",
            Type::Resource(_) => "resource",
            Type::Alias(_) => "alias",
            Type::Struct(_) => "struct",
            Type::Union(_) => "union",
            Type::Event(_) => "event",
            Type::EventAlias(_) => "eventcopy",
            Type::Error(_) => "error",
            Type::ErrorAlias(_) => "errorcopy",
        }
    }

    /// Wire fields of composite types; empty for everything else.
    pub fn fields(&self) -> &[Field<S>] {
        match self {
            Type::Struct(t) | Type::Union(t) => &t.fields,
            Type::Event(t) => &t.fields,
            Type::Error(t) => &t.fields,
            _ => &[],
        }
    }
}

impl Type<Resolved> {
    pub fn ident(&self) -> &str {
        &self.name().src
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive<S: Stage> {
    pub name: S::Name,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType<S: Stage> {
    pub name: S::Name,
    pub items: Vec<EnumItem<S>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem<S: Stage> {
    pub name: S::Name,
    /// Explicit value; filled in for every item by enum numbering.
    pub expr: Option<Expr<S>>,
}

/// Opaque resource handle (`xidtype` / `xidunion`).
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<S: Stage> {
    pub name: S::Name,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias<S: Stage> {
    pub name: S::Name,
    pub old: S::TypeRef,
}

/// Body of a struct or union.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType<S: Stage> {
    pub name: S::Name,
    pub fields: Vec<Field<S>>,
}

impl<S: Stage> StructType<S> {
    /// True when a list field makes the per-element size variable.
    pub fn has_list(&self) -> bool {
        self.fields.iter().any(|f| matches!(f, Field::List(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event<S: Stage> {
    pub name: S::Name,
    pub number: i32,
    pub no_sequence: bool,
    pub fields: Vec<Field<S>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorType<S: Stage> {
    pub name: S::Name,
    pub number: i32,
    pub fields: Vec<Field<S>>,
}

impl ErrorType<Resolved> {
    pub fn ident(&self) -> String {
        format!("{}Error", self.name.src)
    }

    /// Name of the error-code constant, e.g. `BadWindow`.
    pub fn constant(&self) -> String {
        format!("Bad{}", self.name.src)
    }
}

/// An event or error re-declared under a new name and number.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyType<S: Stage> {
    pub name: S::Name,
    pub number: i32,
    pub old: S::TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field<S: Stage> {
    Pad(PadField),
    Single(SingleField<S>),
    List(ListField<S>),
    /// Caller-supplied parameter that never goes over the wire.
    Local(SingleField<S>),
    Expr(ExprField<S>),
    Value(ValueField<S>),
    Switch(SwitchField<S>),
}

impl<S: Stage> Field<S> {
    /// Field name; padding, value lists and switches are anonymous on the wire.
    pub fn name(&self) -> Option<&S::Name> {
        match self {
            Field::Single(f) | Field::Local(f) => Some(&f.name),
            Field::List(f) => Some(&f.name),
            Field::Expr(f) => Some(&f.name),
            Field::Pad(_) | Field::Value(_) | Field::Switch(_) => None,
        }
    }

    pub fn xml_name(&self) -> Option<&str> {
        self.name().map(S::xml_name)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Field::Pad(_) => "pad",
            Field::Single(_) => "field",
            Field::List(_) => "list",
            Field::Local(_) => "localfield",
            Field::Expr(_) => "exprfield",
            Field::Value(_) => "valueparam",
            Field::Switch(_) => "switch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadField {
    pub bytes: u32,
    /// Round the offset up to this alignment instead of skipping `bytes`.
    pub align: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleField<S: Stage> {
    pub name: S::Name,
    pub ty: S::TypeRef,
    pub hints: FieldHints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListField<S: Stage> {
    pub name: S::Name,
    pub ty: S::TypeRef,
    /// Element count; absent means the runtime length of the list itself.
    pub length: Option<Expr<S>>,
}

/// Field whose value is computed from other fields when writing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprField<S: Stage> {
    pub name: S::Name,
    pub ty: S::TypeRef,
    pub expr: Expr<S>,
}

/// A bit mask followed by one 4-byte value per set bit.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueField<S: Stage> {
    pub mask_type: S::TypeRef,
    pub mask_name: S::Name,
    pub list_name: S::Name,
}

/// Bit-dispatched variant field. Sizes and codecs are not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchField<S: Stage> {
    pub name: S::Name,
    pub expr: Expr<S>,
    pub bitcases: Vec<Bitcase<S>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bitcase<S: Stage> {
    pub expr: Expr<S>,
    pub fields: Vec<Field<S>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request<S: Stage> {
    pub name: S::Name,
    pub opcode: u32,
    pub combine: bool,
    pub fields: Vec<Field<S>>,
    pub reply: Option<Reply<S>>,
}

impl Request<Resolved> {
    pub fn request_ident(&self) -> String {
        format!("{}Request", self.name.src)
    }

    pub fn cookie_ident(&self) -> String {
        format!("{}Cookie", self.name.src)
    }

    pub fn reply_ident(&self) -> String {
        format!("{}Reply", self.name.src)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply<S: Stage> {
    pub fields: Vec<Field<S>>,
}

impl Event<Resolved> {
    pub fn ident(&self) -> String {
        format!("{}Event", self.name.src)
    }
}
