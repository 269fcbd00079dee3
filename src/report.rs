//! Text layout report: a [`Backend`] that lists every entity with its size and
//! the byte offset of each field, plus the read and write sequences.

use std::fmt::Write as _;

use crate::backend::{Backend, Item};
use crate::enums::item_value;
use crate::error::Error;
use crate::ir::*;
use crate::layout::{request_fields, value_list_length, Placement, Size};

#[derive(Debug, Default)]
pub struct LayoutReport {
    out: String,
}

impl LayoutReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, indent: usize, text: impl AsRef<str>) {
        let pad = "  ".repeat(indent);
        // Writing into a String cannot fail.
        let _ = writeln!(self.out, "{}{}", pad, text.as_ref());
    }
}

fn exactness(size: &Size) -> &'static str {
    if size.exact {
        "exact"
    } else {
        "inexact"
    }
}

/// Short description of a field's type and shape.
fn describe_field(field: &Field<Resolved>, prefix: &str) -> String {
    match field {
        Field::Pad(p) => match p.align {
            Some(a) => format!("align {}", a),
            None => format!("pad {}", p.bytes),
        },
        Field::Single(f) => format!("{}: {}", f.name, f.ty.ident),
        Field::Local(f) => format!("{}: {} (local, not sent)", f.name, f.ty.ident),
        Field::List(l) => match &l.length {
            Some(len) => format!("{}: [{}; {}]", l.name, l.ty.ident, len.reduce(prefix)),
            None => format!("{}: [{}]", l.name, l.ty.ident),
        },
        Field::Expr(f) => format!("{}: {} = {}", f.name, f.ty.ident, f.expr.reduce(prefix)),
        Field::Value(v) => format!(
            "{}: {} selects {}: [u32; {}]",
            v.mask_name,
            v.mask_type.ident,
            v.list_name,
            value_list_length(v).reduce(prefix)
        ),
        Field::Switch(s) => format!(
            "switch {} on {} ({} bitcases)",
            s.name,
            s.expr.reduce(prefix),
            s.bitcases.len()
        ),
    }
}

/// Placement of fields outside a request: only local fields stay off the wire.
fn placed(fields: &[Field<Resolved>]) -> Vec<(&Field<Resolved>, Placement)> {
    fields
        .iter()
        .map(|f| match f {
            Field::Local(_) => (f, Placement::Local),
            _ => (f, Placement::Wire),
        })
        .collect()
}

impl LayoutReport {
    /// One line per field with its running offset. Union members all start at 0.
    fn field_offsets(
        &mut self,
        set: &ModuleSet,
        fields: &[Field<Resolved>],
        start: Size,
        overlapping: bool,
    ) -> Result<(), Error> {
        let mut offset = start;
        for f in fields {
            let size = set.field_size(f)?;
            self.line(
                1,
                format!(
                    "@{} {} ({} bytes, {})",
                    offset.reduce(""),
                    describe_field(f, ""),
                    size.reduce(""),
                    exactness(&size)
                ),
            );
            if !overlapping {
                offset = offset.add(size);
            }
        }
        Ok(())
    }

    /// Offsets of a request's fields. The core module's first field sits in
    /// the header at byte 1, after the opcode; later fields follow the
    /// header. Fields that are not sent get no offset.
    fn request_offsets(
        &mut self,
        set: &ModuleSet,
        module: ModuleId,
        request: &Request<Resolved>,
    ) -> Result<(), Error> {
        let mut offset = Size::fixed(set.request_header(module), true);
        let mut squeezed = !set.module(module).is_extension();
        for (f, placement) in request_fields(request) {
            let size = set.field_size(f)?;
            match placement {
                Placement::Wire => {
                    let at = if squeezed {
                        squeezed = false;
                        Size::fixed(1, true)
                    } else {
                        offset.clone()
                    };
                    self.line(
                        1,
                        format!(
                            "@{} {} ({} bytes, {})",
                            at.reduce(""),
                            describe_field(f, ""),
                            size.reduce(""),
                            exactness(&size)
                        ),
                    );
                    offset = offset.add(size);
                }
                Placement::Local => self.line(1, format!("- {}", describe_field(f, ""))),
                Placement::SharedMask => {
                    self.line(1, format!("- {} (counted by the value list)", describe_field(f, "")))
                }
            }
        }
        Ok(())
    }

    /// Read or write sequence over a field list.
    fn field_steps(
        &mut self,
        set: &ModuleSet,
        verb: &str,
        fields: &[(&Field<Resolved>, Placement)],
        prefix: &str,
        overlapping: bool,
    ) -> Result<(), Error> {
        for &(f, placement) in fields {
            if let Field::Switch(s) = f {
                return Err(Error::unsupported("switch field codec", s.name.xml.clone()));
            }
            let size = set.field_size(f)?;
            let target = match f.name() {
                Some(name) => format!("{}{}", prefix, name),
                None => describe_field(f, prefix),
            };
            match placement {
                Placement::Local => {
                    self.line(1, format!("{} (local, not on the wire)", target));
                    continue;
                }
                Placement::SharedMask => {
                    self.line(1, format!("{} (sent with the value list)", target));
                    continue;
                }
                Placement::Wire => {}
            }
            match f {
                Field::Pad(_) => self.line(1, format!("skip {}", describe_field(f, prefix))),
                _ => self.line(1, format!("{} {}", verb, target)),
            }
            if !overlapping {
                self.line(2, format!("b += {}", size.reduce(prefix)));
            }
        }
        Ok(())
    }

    fn composite(item: &Item<'_>) -> Option<(&'static str, String, bool)> {
        match item {
            Item::Type { ty, .. } => match ty {
                Type::Struct(_) | Type::Event(_) | Type::Error(_) => {
                    Some((ty.kind(), ty.ident().to_string(), false))
                }
                Type::Union(_) => Some((ty.kind(), ty.ident().to_string(), true)),
                _ => None,
            },
            Item::Request { request, .. } => Some(("request", request.name.src.clone(), false)),
        }
    }

    fn steps(&mut self, set: &ModuleSet, item: &Item<'_>, verb: &str, prefix: &str) -> Result<(), Error> {
        let Some((kind, ident, overlapping)) = Self::composite(item) else {
            return Ok(());
        };
        self.line(0, format!("{} {} {}:", verb, kind, ident));
        match item {
            Item::Type { ty, .. } => {
                self.field_steps(set, verb, &placed(ty.fields()), prefix, overlapping)?
            }
            Item::Request { request, .. } => {
                self.field_steps(set, verb, &request_fields(request), prefix, false)?;
                if let Some(reply) = &request.reply {
                    self.line(0, format!("{} reply {}:", verb, request.reply_ident()));
                    self.field_steps(set, verb, &placed(&reply.fields), prefix, false)?;
                }
            }
        }
        self.line(0, "");
        Ok(())
    }
}

impl Backend for LayoutReport {
    type Output = String;

    fn define(&mut self, set: &ModuleSet, item: &Item<'_>) -> Result<(), Error> {
        match item {
            Item::Type { id, ty } => match ty {
                Type::Primitive(_) => {}
                Type::Enum(e) => {
                    self.line(0, format!("enum {} ({})", e.name.src, e.name.xml));
                    for i in &e.items {
                        let value = item_value(i)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "?".to_string());
                        self.line(1, format!("{} = {}", i.name, value));
                    }
                }
                Type::Resource(r) => {
                    let size = set.type_size(*id)?;
                    self.line(
                        0,
                        format!("resource {} ({}) size {} {}", r.name.src, r.name.xml, size.reduce(""), exactness(&size)),
                    );
                }
                Type::Alias(a) => {
                    let size = match set.underlying(&a.old) {
                        Type::Enum(_) => "-".to_string(),
                        _ => set.type_size(*id)?.reduce(""),
                    };
                    self.line(
                        0,
                        format!("alias {} ({}) = {} size {}", a.name.src, a.name.xml, a.old.ident, size),
                    );
                }
                Type::Struct(_) | Type::Union(_) | Type::Event(_) | Type::Error(_) => {
                    let size = set.type_size(*id)?;
                    let mut header = format!(
                        "{} {} ({}) size {} {}",
                        ty.kind(),
                        ty.ident(),
                        ty.xml_name(),
                        size.reduce(""),
                        exactness(&size)
                    );
                    match ty {
                        Type::Event(e) => {
                            let _ = write!(header, " number {} as {}", e.number, e.ident());
                            if e.no_sequence {
                                header.push_str(" no-sequence");
                            }
                        }
                        Type::Error(e) => {
                            let _ = write!(header, " number {} as {} ({})", e.number, e.ident(), e.constant());
                        }
                        _ => {}
                    }
                    self.line(0, header);
                    let overlapping = matches!(ty, Type::Union(_));
                    self.field_offsets(set, ty.fields(), Size::fixed(0, true), overlapping)?;
                }
                Type::EventAlias(c) | Type::ErrorAlias(c) => {
                    let size = set.type_size(*id)?;
                    self.line(
                        0,
                        format!(
                            "{} {} ({}) = {} number {} size {} {}",
                            ty.kind(),
                            c.name.src,
                            c.name.xml,
                            c.old.ident,
                            c.number,
                            size.reduce(""),
                            exactness(&size)
                        ),
                    );
                }
            },
            Item::Request { module, request } => {
                let size = set.request_size(*module, request)?;
                self.line(
                    0,
                    format!(
                        "request {} ({}) opcode {} size {} {}",
                        request.request_ident(),
                        request.name.xml,
                        request.opcode,
                        size.reduce(""),
                        exactness(&size)
                    ),
                );
                self.request_offsets(set, *module, request)?;
                if let Some(reply) = &request.reply {
                    let size = set.fields_size(&reply.fields)?;
                    self.line(
                        0,
                        format!(
                            "reply {} fields {} {}",
                            request.reply_ident(),
                            size.reduce(""),
                            exactness(&size)
                        ),
                    );
                    self.field_offsets(set, &reply.fields, Size::fixed(0, true), false)?;
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, set: &ModuleSet, item: &Item<'_>, prefix: &str) -> Result<(), Error> {
        self.steps(set, item, "read", prefix)
    }

    fn write(&mut self, set: &ModuleSet, item: &Item<'_>, prefix: &str) -> Result<(), Error> {
        self.steps(set, item, "write", prefix)
    }

    fn finish(self) -> String {
        self.out
    }
}
