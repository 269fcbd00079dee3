//! Resolve placeholders and derive output identifiers.
//!
//! Resolution is a pure function from the translated set to a new resolved
//! set; the input is left untouched, so resolving twice gives equal results.
//! Modules are processed in arena order (imports first). Within a module the
//! order is fixed: primitives, then other types in declaration order, then
//! requests.
//!
//! ## Lookup
//!
//! A reference `ns:name` is searched only in the module named `ns` (compared
//! without case) among the referencing module and its imports. A plain `name`
//! is searched in the referencing module first, then in each import in
//! declaration order. The first type whose description name matches wins.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::config::Config;
use crate::error::Error;
use crate::expr::Expr;
use crate::ir::*;

/// Resolve every module of a translated set.
pub fn resolve(translated: &Translated, config: &Config) -> Result<ModuleSet, Error> {
    let resolver = Resolver { translated, config };
    let mut modules = Vec::with_capacity(translated.modules.len());
    for id in translated.ids() {
        let module = resolver.module(id)?;
        debug!(module = %module.name, types = module.types.len(), "resolved module");
        modules.push(module);
    }
    let set = ModuleSet {
        modules,
        root: translated.root,
    };
    check_alias_chains(&set)?;
    Ok(set)
}

/// Reject typedef chains that lead back to a typedef already visited.
fn check_alias_chains(set: &ModuleSet) -> Result<(), Error> {
    for module in set.ids() {
        for (index, ty) in set.module(module).types.iter().enumerate() {
            if !matches!(ty, Type::Alias(_)) {
                continue;
            }
            let mut seen = HashSet::new();
            let mut id = TypeId { module, index };
            while let Type::Alias(a) = set.get(id) {
                if !seen.insert(id) {
                    return Err(Error::AliasCycle {
                        name: ty.xml_name().to_string(),
                    });
                }
                id = a.old.id;
            }
        }
    }
    Ok(())
}

struct Resolver<'a> {
    translated: &'a Translated,
    config: &'a Config,
}

impl<'a> Resolver<'a> {
    fn module(&self, id: ModuleId) -> Result<Module<Resolved>, Error> {
        let m = self.translated.module(id);
        let cx = Scope { resolver: self, id };

        // The translator seeds primitives ahead of declared types, so arena
        // order is already primitives first, then declaration order.
        let mut types = Vec::with_capacity(m.types.len());
        for ty in &m.types {
            types.push(cx.ty(ty)?);
        }

        let mut requests = Vec::with_capacity(m.requests.len());
        for r in &m.requests {
            requests.push(cx.request(r)?);
        }

        Ok(Module {
            name: m.name.clone(),
            parent: m.parent,
            extension_xname: m.extension_xname.clone(),
            extension_name: m.extension_name.clone(),
            major_version: m.major_version,
            minor_version: m.minor_version,
            imports: m.imports.clone(),
            types,
            requests,
        })
    }

    /// Output identifier of a type as declared in its own module.
    fn local_ident(&self, ty: &Type<Unresolved>) -> String {
        match ty {
            Type::Primitive(p) => match self.config.primitive(&p.name) {
                Some(spec) => spec.ident.clone(),
                None => self.config.type_src_name(&p.name),
            },
            _ => self.config.type_src_name(ty.xml_name()),
        }
    }
}

/// Resolution context of one module.
struct Scope<'r, 'a> {
    resolver: &'r Resolver<'a>,
    id: ModuleId,
}

impl<'r, 'a> Scope<'r, 'a> {
    fn module(&self) -> &'a Module<Unresolved> {
        self.resolver.translated.module(self.id)
    }

    fn name(&self, xml: &str) -> Ident {
        Ident::new(xml, self.resolver.config.src_name(xml))
    }

    fn type_name(&self, ty: &Type<Unresolved>) -> Ident {
        Ident::new(ty.xml_name(), self.resolver.local_ident(ty))
    }

    /// Find the type a placeholder names.
    fn lookup(&self, placeholder: &Placeholder) -> Result<TypeId, Error> {
        let set = self.resolver.translated;
        let here = self.module();
        let (namespace, name) = placeholder.split();
        let candidates = std::iter::once(self.id).chain(here.imports.iter().copied());

        let search: Vec<ModuleId> = match namespace {
            Some(ns) => {
                let matching: Vec<ModuleId> = candidates
                    .filter(|&m| set.module(m).name.eq_ignore_ascii_case(ns))
                    .collect();
                if matching.is_empty() {
                    return Err(Error::UnknownNamespace {
                        namespace: ns.to_string(),
                        name: placeholder.name.clone(),
                        module: here.name.clone(),
                    });
                }
                matching
            }
            None => candidates.collect(),
        };

        for m in search {
            if let Some(index) = set.module(m).find_type(name) {
                trace!(name = %placeholder.name, found_in = %set.module(m).name, "resolved type");
                return Ok(TypeId { module: m, index });
            }
        }
        Err(Error::UnknownType {
            name: placeholder.name.clone(),
            module: here.name.clone(),
        })
    }

    fn type_ref(&self, placeholder: &Placeholder) -> Result<TypeRef, Error> {
        let id = self.lookup(placeholder)?;
        let set = self.resolver.translated;
        let target = set.get(id);
        let local = self.resolver.local_ident(target);
        let ident = if id.module == self.id {
            local
        } else {
            format!("{}::{}", set.module(id.module).package(), local)
        };
        Ok(TypeRef { id, ident })
    }

    fn ty(&self, ty: &Type<Unresolved>) -> Result<Type<Resolved>, Error> {
        let name = self.type_name(ty);
        Ok(match ty {
            Type::Primitive(p) => Type::Primitive(Primitive {
                name,
                width: p.width,
            }),
            Type::Enum(e) => {
                let mut items = Vec::with_capacity(e.items.len());
                for item in &e.items {
                    items.push(EnumItem {
                        name: self.name(&item.name),
                        expr: item.expr.as_ref().map(|x| self.expr(x)).transpose()?,
                    });
                }
                Type::Enum(EnumType { name, items })
            }
            Type::Resource(r) => Type::Resource(Resource {
                name,
                width: r.width,
            }),
            Type::Alias(a) => Type::Alias(Alias {
                name,
                old: self.type_ref(&a.old)?,
            }),
            Type::Struct(s) => Type::Struct(StructType {
                name,
                fields: self.fields(&s.fields)?,
            }),
            Type::Union(u) => Type::Union(StructType {
                name,
                fields: self.fields(&u.fields)?,
            }),
            Type::Event(e) => Type::Event(Event {
                name,
                number: e.number,
                no_sequence: e.no_sequence,
                fields: self.fields(&e.fields)?,
            }),
            Type::EventAlias(c) => {
                let old = self.type_ref(&c.old)?;
                if !matches!(self.resolver.translated.get(old.id), Type::Event(_)) {
                    return Err(Error::TypeMismatch {
                        name: c.old.name.clone(),
                        expected: "an event",
                    });
                }
                Type::EventAlias(CopyType {
                    name,
                    number: c.number,
                    old,
                })
            }
            Type::Error(e) => Type::Error(ErrorType {
                name,
                number: e.number,
                fields: self.fields(&e.fields)?,
            }),
            Type::ErrorAlias(c) => {
                let old = self.type_ref(&c.old)?;
                if !matches!(self.resolver.translated.get(old.id), Type::Error(_)) {
                    return Err(Error::TypeMismatch {
                        name: c.old.name.clone(),
                        expected: "an error",
                    });
                }
                Type::ErrorAlias(CopyType {
                    name,
                    number: c.number,
                    old,
                })
            }
        })
    }

    fn request(&self, r: &Request<Unresolved>) -> Result<Request<Resolved>, Error> {
        let reply = match &r.reply {
            Some(reply) => Some(Reply {
                fields: self.fields(&reply.fields)?,
            }),
            None => None,
        };
        Ok(Request {
            name: self.name(&r.name),
            opcode: r.opcode,
            combine: r.combine,
            fields: self.fields(&r.fields)?,
            reply,
        })
    }

    fn fields(&self, fields: &[Field<Unresolved>]) -> Result<Vec<Field<Resolved>>, Error> {
        fields.iter().map(|f| self.field(f)).collect()
    }

    fn single(&self, f: &SingleField<Unresolved>) -> Result<SingleField<Resolved>, Error> {
        Ok(SingleField {
            name: self.name(&f.name),
            ty: self.type_ref(&f.ty)?,
            hints: f.hints.clone(),
        })
    }

    fn field(&self, f: &Field<Unresolved>) -> Result<Field<Resolved>, Error> {
        Ok(match f {
            Field::Pad(p) => Field::Pad(*p),
            Field::Single(s) => Field::Single(self.single(s)?),
            Field::Local(s) => Field::Local(self.single(s)?),
            Field::List(l) => Field::List(ListField {
                name: self.name(&l.name),
                ty: self.type_ref(&l.ty)?,
                length: l.length.as_ref().map(|x| self.expr(x)).transpose()?,
            }),
            Field::Expr(e) => Field::Expr(ExprField {
                name: self.name(&e.name),
                ty: self.type_ref(&e.ty)?,
                expr: self.expr(&e.expr)?,
            }),
            Field::Value(v) => Field::Value(ValueField {
                mask_type: self.type_ref(&v.mask_type)?,
                mask_name: self.name(&v.mask_name),
                list_name: self.name(&v.list_name),
            }),
            Field::Switch(s) => {
                let mut bitcases = Vec::with_capacity(s.bitcases.len());
                for bc in &s.bitcases {
                    bitcases.push(Bitcase {
                        expr: self.expr(&bc.expr)?,
                        fields: self.fields(&bc.fields)?,
                    });
                }
                Field::Switch(SwitchField {
                    name: self.name(&s.name),
                    expr: self.expr(&s.expr)?,
                    bitcases,
                })
            }
        })
    }

    fn expr(&self, e: &Expr<Unresolved>) -> Result<Expr<Resolved>, Error> {
        Ok(match e {
            Expr::Literal(v) => Expr::Literal(*v),
            Expr::Bit(b) => Expr::Bit(*b),
            Expr::FieldRef(name) => Expr::FieldRef(self.name(name)),
            Expr::EnumRef { ty, item } => Expr::EnumRef {
                ty: self.type_ref(ty)?,
                item: self.name(item),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(self.expr(expr)?),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(self.expr(lhs)?),
                rhs: Box::new(self.expr(rhs)?),
            },
            Expr::Pad(inner) => Expr::Pad(Box::new(self.expr(inner)?)),
            Expr::PopCount(inner) => Expr::PopCount(Box::new(self.expr(inner)?)),
            Expr::SumOf(name) => Expr::SumOf(self.name(name)),
            Expr::Call { func, arg } => Expr::Call {
                func: func.clone(),
                arg: Box::new(self.expr(arg)?),
            },
        })
    }
}
