//! Translate raw description trees into the unresolved IR.
//!
//! No lookup happens here: every type named by a declaration becomes a
//! [`Placeholder`]. The primitive table from [`Config`] is seeded into every
//! module ahead of its declared types.

use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::ir::*;
use crate::loader::RawForest;
use crate::raw::{self, Description, ExprDecl, FieldDecl, FieldHints};

/// Request whose description references an undeclared `string_len` field.
const QUERY_TEXT_EXTENTS: &str = "QueryTextExtents";

/// Translate every module of the forest. Module ids equal forest indices, so
/// imports keep preceding their importers.
pub fn translate(forest: &RawForest, config: &Config) -> Result<Translated, Error> {
    let mut modules = Vec::with_capacity(forest.modules.len());
    for raw in &forest.modules {
        let module = translate_module(
            &raw.description,
            raw.imports.iter().map(|&i| ModuleId(i)).collect(),
            raw.parent.map(ModuleId),
            config,
        )?;
        debug!(
            module = %module.name,
            types = module.types.len(),
            requests = module.requests.len(),
            "translated module"
        );
        modules.push(module);
    }
    Ok(ModuleSet {
        modules,
        root: ModuleId(forest.root),
    })
}

pub fn translate_module(
    d: &Description,
    imports: Vec<ModuleId>,
    parent: Option<ModuleId>,
    config: &Config,
) -> Result<Module<Unresolved>, Error> {
    let mut types = Vec::new();

    for p in config.primitives() {
        types.push(Type::Primitive(Primitive {
            name: p.name.clone(),
            width: p.width,
        }));
    }
    for e in &d.enums {
        let mut items = Vec::with_capacity(e.items.len());
        for item in &e.items {
            items.push(EnumItem {
                name: item.name.clone(),
                expr: item.expr.as_ref().map(translate_expr).transpose()?,
            });
        }
        types.push(Type::Enum(EnumType {
            name: e.name.clone(),
            items,
        }));
    }
    for name in d.xids.iter().chain(&d.xid_unions) {
        types.push(Type::Resource(Resource {
            name: name.clone(),
            width: config.resource_width(),
        }));
    }
    for t in &d.typedefs {
        types.push(Type::Alias(Alias {
            name: t.new.clone(),
            old: Placeholder::new(&t.old),
        }));
    }
    for s in &d.structs {
        types.push(Type::Struct(StructType {
            name: s.name.clone(),
            fields: translate_fields(&s.fields)?,
        }));
    }
    for u in &d.unions {
        types.push(Type::Union(StructType {
            name: u.name.clone(),
            fields: translate_fields(&u.fields)?,
        }));
    }
    for ev in &d.events {
        types.push(Type::Event(Event {
            name: ev.name.clone(),
            number: ev.number,
            no_sequence: ev.no_sequence,
            fields: translate_fields(&ev.fields)?,
        }));
    }
    for c in &d.event_copies {
        types.push(Type::EventAlias(translate_copy(c)));
    }
    for er in &d.errors {
        types.push(Type::Error(ErrorType {
            name: er.name.clone(),
            number: er.number,
            fields: translate_fields(&er.fields)?,
        }));
    }
    for c in &d.error_copies {
        types.push(Type::ErrorAlias(translate_copy(c)));
    }

    let mut requests = Vec::with_capacity(d.requests.len());
    for r in &d.requests {
        requests.push(translate_request(r)?);
    }

    Ok(Module {
        name: d.header.clone(),
        parent,
        extension_xname: d.extension_xname.clone(),
        extension_name: d.extension_name.clone(),
        major_version: d.major_version,
        minor_version: d.minor_version,
        imports,
        types,
        requests,
    })
}

fn translate_copy(c: &raw::CopyDecl) -> CopyType<Unresolved> {
    CopyType {
        name: c.name.clone(),
        number: c.number,
        old: Placeholder::new(&c.reference),
    }
}

fn translate_request(r: &raw::RequestDecl) -> Result<Request<Unresolved>, Error> {
    let mut fields = translate_fields(&r.fields)?;

    // The length of `odd_length` in QueryTextExtents is computed from
    // `string_len`, which the description never declares. Supply it as a
    // caller parameter that is not sent.
    if r.name == QUERY_TEXT_EXTENTS
        && !fields.iter().any(|f| f.xml_name() == Some("string_len"))
    {
        fields.push(Field::Local(SingleField {
            name: "string_len".to_string(),
            ty: Placeholder::new("CARD16"),
            hints: FieldHints::default(),
        }));
    }

    let reply = match &r.reply {
        Some(fields) => Some(Reply {
            fields: translate_fields(fields)?,
        }),
        None => None,
    };
    Ok(Request {
        name: r.name.clone(),
        opcode: r.opcode,
        combine: r.combine,
        fields,
        reply,
    })
}

fn translate_fields(fields: &[FieldDecl]) -> Result<Vec<Field<Unresolved>>, Error> {
    fields.iter().map(translate_field).collect()
}

pub fn translate_field(f: &FieldDecl) -> Result<Field<Unresolved>, Error> {
    Ok(match f {
        FieldDecl::Pad { bytes, align } => Field::Pad(PadField {
            bytes: *bytes,
            align: *align,
        }),
        FieldDecl::Field { name, ty, hints } => Field::Single(SingleField {
            name: name.clone(),
            ty: Placeholder::new(ty),
            hints: hints.clone(),
        }),
        FieldDecl::List { name, ty, length } => Field::List(ListField {
            name: name.clone(),
            ty: Placeholder::new(ty),
            length: length.as_ref().map(translate_expr).transpose()?,
        }),
        FieldDecl::LocalField { name, ty } => Field::Local(SingleField {
            name: name.clone(),
            ty: Placeholder::new(ty),
            hints: FieldHints::default(),
        }),
        FieldDecl::ExprField { name, ty, expr } => Field::Expr(ExprField {
            name: name.clone(),
            ty: Placeholder::new(ty),
            expr: translate_expr(expr)?,
        }),
        FieldDecl::ValueParam {
            mask_type,
            mask_name,
            list_name,
        } => Field::Value(ValueField {
            mask_type: Placeholder::new(mask_type),
            mask_name: mask_name.clone(),
            list_name: list_name.clone(),
        }),
        FieldDecl::Switch {
            name,
            expr,
            bitcases,
        } => {
            let mut cases = Vec::with_capacity(bitcases.len());
            for bc in bitcases {
                cases.push(Bitcase {
                    expr: translate_expr(&bc.expr)?,
                    fields: translate_fields(&bc.fields)?,
                });
            }
            Field::Switch(SwitchField {
                name: name.clone(),
                expr: translate_expr(expr)?,
                bitcases: cases,
            })
        }
    })
}

pub fn translate_expr(e: &ExprDecl) -> Result<Expr<Unresolved>, Error> {
    Ok(match e {
        ExprDecl::Op { op, lhs, rhs } => Expr::Binary {
            op: BinaryOp::parse(op)?,
            lhs: Box::new(translate_expr(lhs)?),
            rhs: Box::new(translate_expr(rhs)?),
        },
        ExprDecl::Unop { op, expr } => Expr::Unary {
            op: UnaryOp::parse(op)?,
            expr: Box::new(translate_expr(expr)?),
        },
        ExprDecl::PopCount(inner) => Expr::PopCount(Box::new(translate_expr(inner)?)),
        ExprDecl::Value(v) => Expr::Literal(*v),
        ExprDecl::Bit(b) => {
            if !(0..=31).contains(b) {
                return Err(Error::InvalidBit { bit: *b });
            }
            Expr::Bit(*b as u32)
        }
        ExprDecl::FieldRef(name) => Expr::FieldRef(name.clone()),
        ExprDecl::EnumRef { ty, item } => Expr::EnumRef {
            ty: Placeholder::new(ty),
            item: item.clone(),
        },
        ExprDecl::SumOf(name) => Expr::SumOf(name.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(src: &str) -> Module<Unresolved> {
        let d = raw::parse(src).expect("parse");
        translate_module(&d, Vec::new(), None, &Config::default()).expect("translate")
    }

    #[test]
    fn primitives_are_seeded_first() {
        let m = module(r#"<xcb header="t"><xidtype name="WINDOW"/></xcb>"#);
        let config = Config::default();
        let n = config.primitives().len();
        assert_eq!(m.types.len(), n + 1);
        assert!(m.types[..n].iter().all(|t| matches!(t, Type::Primitive(_))));
        assert_eq!(m.types[n].xml_name(), "WINDOW");
    }

    #[test]
    fn references_stay_placeholders() {
        let m = module(
            r#"<xcb header="t"><struct name="S"><field type="xproto:WINDOW" name="w"/></struct></xcb>"#,
        );
        let s = m.types.last().expect("struct");
        match &s.fields()[0] {
            Field::Single(f) => {
                assert_eq!(f.ty.name, "xproto:WINDOW");
                assert_eq!(f.ty.split(), (Some("xproto"), "WINDOW"));
            }
            other => panic!("unexpected field {:?}", other),
        }
    }

    #[test]
    fn query_text_extents_gets_string_len() {
        let m = module(
            r#"<xcb header="xproto">
  <request name="QueryTextExtents" opcode="48">
    <exprfield type="BOOL" name="odd_length">
      <op op="&amp;"><fieldref>string_len</fieldref><value>1</value></op>
    </exprfield>
    <field type="CARD32" name="font"/>
  </request>
  <request name="Other" opcode="1"/>
</xcb>"#,
        );
        let last = m.requests[0].fields.last().expect("field");
        assert!(matches!(last, Field::Local(f) if f.name == "string_len" && f.ty.name == "CARD16"));
        assert!(m.requests[1].fields.is_empty());
    }

    #[test]
    fn bit_out_of_range_is_rejected() {
        let d = raw::parse(r#"<xcb header="t"><enum name="E"><item name="A"><bit>32</bit></item></enum></xcb>"#)
            .expect("parse");
        let err = translate_module(&d, Vec::new(), None, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidBit { bit: 32 }));
    }
}
