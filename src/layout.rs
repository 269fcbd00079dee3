//! Wire size of types, fields and requests.
//!
//! A [`Size`] is an expression plus an `exact` flag. Exact means the expression
//! is a precise formula for the wire size, even when it needs runtime field
//! values to evaluate. Padding fields with an alignment are not exact: they
//! stand for "round up to this alignment", not for a byte count.
//!
//! Two limitations are kept on purpose:
//! - a union is as large as its first field;
//! - a switch field always reports `0`, exact.

use crate::error::Error;
use crate::expr::{BinaryOp, Expr, INT_COERCION};
use crate::ir::*;

/// Width of each value in a mask-selected value list.
const VALUE_WIDTH: i64 = 4;
/// Fixed wire size of events and errors.
const EVENT_SIZE: i64 = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Size {
    pub expr: Expr<Resolved>,
    pub exact: bool,
}

impl Size {
    pub fn fixed(bytes: i64, exact: bool) -> Self {
        Size {
            expr: Expr::Literal(bytes),
            exact,
        }
    }

    pub fn of(expr: Expr<Resolved>, exact: bool) -> Self {
        Size { expr, exact }
    }

    pub fn add(self, other: Size) -> Size {
        Size {
            expr: Expr::binary(BinaryOp::Add, self.expr, other.expr),
            exact: self.exact && other.exact,
        }
    }

    pub fn multiply(self, other: Size) -> Size {
        Size {
            expr: Expr::binary(BinaryOp::Mul, self.expr, other.expr),
            exact: self.exact && other.exact,
        }
    }

    pub fn padded(self) -> Size {
        Size {
            expr: Expr::pad_of(self.expr),
            exact: self.exact,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.expr.is_concrete()
    }

    /// Byte count when the size folds to a constant.
    pub fn bytes(&self) -> Option<i64> {
        if self.is_concrete() {
            self.expr.eval().ok()
        } else {
            None
        }
    }

    pub fn reduce(&self, prefix: &str) -> String {
        self.expr.reduce(prefix)
    }
}

impl ModuleSet<Resolved> {
    /// Size of a type. Enums have no wire form of their own.
    pub fn type_size(&self, id: TypeId) -> Result<Size, Error> {
        Sizer::new(self).type_size(id)
    }

    /// Sum of field sizes; exact only if every field is.
    pub fn fields_size(&self, fields: &[Field<Resolved>]) -> Result<Size, Error> {
        Sizer::new(self).fields_size(fields)
    }

    pub fn field_size(&self, field: &Field<Resolved>) -> Result<Size, Error> {
        Sizer::new(self).field_size(field)
    }

    /// Element count of a list: the length expression, or the list's own runtime length.
    pub fn list_length(&self, list: &ListField<Resolved>) -> Size {
        match &list.length {
            Some(e) => Size::of(e.clone(), true),
            None => Size::of(Expr::call("len", Expr::FieldRef(list.name.clone())), true),
        }
    }

    pub fn list_size(&self, list: &ListField<Resolved>) -> Result<Size, Error> {
        Sizer::new(self).list_size(list)
    }

    /// Bytes of request header before the fields. The core module squeezes
    /// its first field into the header, so its header takes 3 bytes;
    /// extensions use 4.
    pub fn request_header(&self, module: ModuleId) -> i64 {
        if self.module(module).is_extension() {
            4
        } else {
            3
        }
    }

    /// Wire size of a request: header, every field sent, padded to 4.
    pub fn request_size(
        &self,
        module: ModuleId,
        request: &Request<Resolved>,
    ) -> Result<Size, Error> {
        let mut sizer = Sizer::new(self);
        let mut size = Size::fixed(self.request_header(module), true);
        for (f, placement) in request_fields(request) {
            if placement == Placement::Wire {
                size = size.add(sizer.field_size(f)?);
            }
        }
        Ok(size.padded())
    }
}

/// How a request field takes part in the request's wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Wire,
    /// Caller-supplied, never sent.
    Local,
    /// Plain field that is also the mask of a value list; the value list
    /// carries its bytes.
    SharedMask,
}

/// Request fields in declaration order, each with its placement.
pub fn request_fields(request: &Request<Resolved>) -> Vec<(&Field<Resolved>, Placement)> {
    let masks: Vec<&str> = request
        .fields
        .iter()
        .filter_map(|f| match f {
            Field::Value(v) => Some(v.mask_name.xml.as_str()),
            _ => None,
        })
        .collect();
    request
        .fields
        .iter()
        .map(|f| {
            let placement = match f {
                Field::Local(_) => Placement::Local,
                Field::Single(s) if masks.contains(&s.name.xml.as_str()) => Placement::SharedMask,
                _ => Placement::Wire,
            };
            (f, placement)
        })
        .collect()
}

/// Size computation that remembers which types it is inside, so a type that
/// contains itself is an error instead of endless recursion.
struct Sizer<'a> {
    set: &'a ModuleSet,
    active: Vec<TypeId>,
}

impl<'a> Sizer<'a> {
    fn new(set: &'a ModuleSet) -> Self {
        Sizer {
            set,
            active: Vec::new(),
        }
    }

    fn type_size(&mut self, id: TypeId) -> Result<Size, Error> {
        if self.active.contains(&id) {
            return Err(Error::unsupported("recursive type", self.set.get(id).xml_name()));
        }
        self.active.push(id);
        let size = self.type_size_of(id);
        self.active.pop();
        size
    }

    fn type_size_of(&mut self, id: TypeId) -> Result<Size, Error> {
        let set = self.set;
        let ty = set.get(id);
        match ty {
            Type::Primitive(p) => Ok(Size::fixed(p.width as i64, true)),
            Type::Resource(r) => Ok(Size::fixed(r.width as i64, true)),
            Type::Alias(a) => self.type_size(a.old.id),
            Type::Enum(_) => Err(Error::unsupported("size of enum", ty.xml_name())),
            Type::Struct(s) => self.fields_size(&s.fields),
            Type::Union(u) => match u.fields.first() {
                Some(first) => self.field_size(first),
                None => Err(Error::unsupported("empty union", ty.xml_name())),
            },
            Type::Event(_) | Type::EventAlias(_) | Type::Error(_) | Type::ErrorAlias(_) => {
                Ok(Size::fixed(EVENT_SIZE, true))
            }
        }
    }

    fn fields_size(&mut self, fields: &[Field<Resolved>]) -> Result<Size, Error> {
        let mut size = Size::fixed(0, true);
        for f in fields {
            size = size.add(self.field_size(f)?);
        }
        Ok(size)
    }

    fn field_size(&mut self, field: &Field<Resolved>) -> Result<Size, Error> {
        match field {
            Field::Pad(p) => Ok(match p.align {
                Some(align) => Size::fixed(align as i64, false),
                None => Size::fixed(p.bytes as i64, true),
            }),
            Field::Single(f) | Field::Local(f) => self.type_size(f.ty.id),
            Field::Expr(f) => self.type_size(f.ty.id),
            Field::List(l) => self.list_size(l),
            Field::Value(v) => {
                let mask = self.type_size(v.mask_type.id)?;
                Ok(mask.add(value_list_size(v)))
            }
            // Bitcase sizes depend on which bits are set at runtime.
            Field::Switch(_) => Ok(Size::fixed(0, true)),
        }
    }

    fn list_size(&mut self, list: &ListField<Resolved>) -> Result<Size, Error> {
        let element = self.type_size(list.ty.id)?;
        match self.set.underlying(&list.ty) {
            // Elements differ in size, so the list is summed element by element.
            Type::Struct(s) if s.has_list() => {
                Ok(Size::of(
                    Expr::call(
                        format!("{}ListSize", list.ty.ident),
                        Expr::FieldRef(list.name.clone()),
                    ),
                    element.exact,
                ))
            }
            Type::Struct(_) | Type::Union(_) | Type::Primitive(_) | Type::Resource(_) => {
                let exact = element.exact;
                let total = self.set.list_length(list).multiply(element).padded();
                Ok(Size::of(total.expr, exact))
            }
            other => Err(Error::unsupported(
                "list element type",
                format!("{} ({})", other.xml_name(), other.kind()),
            )),
        }
    }
}

/// `pad(4 * popcount(int(mask)))`
fn value_list_size(v: &ValueField<Resolved>) -> Size {
    Size::of(
        Expr::pad_of(Expr::binary(
            BinaryOp::Mul,
            Expr::Literal(VALUE_WIDTH),
            value_list_length(v),
        )),
        true,
    )
}

/// Number of values selected by the mask: `popcount(int(mask))`.
pub fn value_list_length(v: &ValueField<Resolved>) -> Expr<Resolved> {
    Expr::popcount_of(Expr::call(INT_COERCION, Expr::FieldRef(v.mask_name.clone())))
}

/// Compute every size in the root module so layout errors surface before emission.
pub fn check(set: &ModuleSet) -> Result<(), Error> {
    let root = set.root;
    let module = set.module(root);
    for (index, ty) in module.types.iter().enumerate() {
        let sizeless = match ty {
            Type::Enum(_) => true,
            Type::Alias(a) => matches!(set.underlying(&a.old), Type::Enum(_)),
            _ => false,
        };
        if !sizeless {
            set.type_size(TypeId { module: root, index })?;
        }
        for f in ty.fields() {
            set.field_size(f)?;
        }
    }
    for r in &module.requests {
        set.request_size(root, r)?;
        if let Some(reply) = &r.reply {
            set.fields_size(&reply.fields)?;
        }
    }
    Ok(())
}
