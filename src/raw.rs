//! Raw parse tree of one protocol description file.
//!
//! This is the XML schema layer: element names and attributes are checked and
//! collected into plain declarations, but no name is looked up and nothing is
//! typed beyond what the attributes say. The translator turns a [`Description`]
//! into the IR.

use crate::xml::{self, Element};

/// Root `<xcb>` element of a description file.
#[derive(Debug, Clone, Default)]
pub struct Description {
    pub header: String,
    pub extension_xname: Option<String>,
    pub extension_name: Option<String>,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
    pub imports: Vec<String>,
    pub enums: Vec<EnumDecl>,
    pub xids: Vec<String>,
    pub xid_unions: Vec<String>,
    pub typedefs: Vec<TypedefDecl>,
    pub structs: Vec<StructDecl>,
    pub unions: Vec<StructDecl>,
    pub events: Vec<EventDecl>,
    pub event_copies: Vec<CopyDecl>,
    pub errors: Vec<ErrorDecl>,
    pub error_copies: Vec<CopyDecl>,
    pub requests: Vec<RequestDecl>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub items: Vec<EnumItemDecl>,
}

#[derive(Debug, Clone)]
pub struct EnumItemDecl {
    pub name: String,
    pub expr: Option<ExprDecl>,
}

#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub old: String,
    pub new: String,
}

/// Shared shape of `<struct>` and `<union>`.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct EventDecl {
    pub name: String,
    pub number: i32,
    pub no_sequence: bool,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct ErrorDecl {
    pub name: String,
    pub number: i32,
    pub fields: Vec<FieldDecl>,
}

/// `<eventcopy>` / `<errorcopy>`: a new name and number for an existing event or error.
#[derive(Debug, Clone)]
pub struct CopyDecl {
    pub name: String,
    pub number: i32,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct RequestDecl {
    pub name: String,
    pub opcode: u32,
    pub combine: bool,
    pub fields: Vec<FieldDecl>,
    pub reply: Option<Vec<FieldDecl>>,
}

/// Optional metadata attributes on `<field>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldHints {
    pub enum_name: Option<String>,
    pub mask: Option<String>,
    pub altenum: Option<String>,
}

/// One field element inside a struct, union, event, error, request or reply.
#[derive(Debug, Clone)]
pub enum FieldDecl {
    Pad {
        bytes: u32,
        align: Option<u32>,
    },
    Field {
        name: String,
        ty: String,
        hints: FieldHints,
    },
    List {
        name: String,
        ty: String,
        length: Option<ExprDecl>,
    },
    LocalField {
        name: String,
        ty: String,
    },
    ExprField {
        name: String,
        ty: String,
        expr: ExprDecl,
    },
    ValueParam {
        mask_type: String,
        mask_name: String,
        list_name: String,
    },
    Switch {
        name: String,
        expr: ExprDecl,
        bitcases: Vec<BitcaseDecl>,
    },
}

#[derive(Debug, Clone)]
pub struct BitcaseDecl {
    pub expr: ExprDecl,
    pub fields: Vec<FieldDecl>,
}

/// Expression element, kept in source form (operators are still strings).
#[derive(Debug, Clone, PartialEq)]
pub enum ExprDecl {
    Op {
        op: String,
        lhs: Box<ExprDecl>,
        rhs: Box<ExprDecl>,
    },
    Unop {
        op: String,
        expr: Box<ExprDecl>,
    },
    PopCount(Box<ExprDecl>),
    Value(i64),
    Bit(i64),
    FieldRef(String),
    EnumRef {
        ty: String,
        item: String,
    },
    SumOf(String),
}

const EXPR_TAGS: &[&str] = &[
    "op", "unop", "popcount", "value", "bit", "fieldref", "enumref", "sumof",
];

/// Parse description source into a raw tree.
pub fn parse(source: &str) -> Result<Description, String> {
    let root = xml::parse_document(source)?;
    build_description(&root)
}

fn build_description(root: &Element) -> Result<Description, String> {
    if root.name != "xcb" {
        return Err(format!("expected root element <xcb>, found <{}>", root.name));
    }
    let mut d = Description {
        header: root.required_attr("header")?.to_string(),
        extension_xname: root.attr("extension-xname").map(str::to_string),
        extension_name: root.attr("extension-name").map(str::to_string),
        major_version: root
            .attr("major-version")
            .map(|v| parse_number(v, "major-version"))
            .transpose()?,
        minor_version: root
            .attr("minor-version")
            .map(|v| parse_number(v, "minor-version"))
            .transpose()?,
        ..Default::default()
    };

    for child in root.elements() {
        match child.name.as_str() {
            "import" => {
                let name = child.text();
                if name.is_empty() {
                    return Err("<import> without a module name".to_string());
                }
                d.imports.push(name);
            }
            "enum" => d.enums.push(build_enum(child)?),
            "xidtype" => d.xids.push(child.required_attr("name")?.to_string()),
            "xidunion" => d.xid_unions.push(child.required_attr("name")?.to_string()),
            "typedef" => d.typedefs.push(TypedefDecl {
                old: child.required_attr("oldname")?.to_string(),
                new: child.required_attr("newname")?.to_string(),
            }),
            "struct" => d.structs.push(build_struct(child)?),
            "union" => d.unions.push(build_struct(child)?),
            "event" => d.events.push(EventDecl {
                name: child.required_attr("name")?.to_string(),
                number: parse_number(child.required_attr("number")?, "number")?,
                no_sequence: parse_bool(child.attr("no-sequence-number"))?,
                fields: build_fields(child)?,
            }),
            "error" => d.errors.push(ErrorDecl {
                name: child.required_attr("name")?.to_string(),
                number: parse_number(child.required_attr("number")?, "number")?,
                fields: build_fields(child)?,
            }),
            "eventcopy" => d.event_copies.push(build_copy(child)?),
            "errorcopy" => d.error_copies.push(build_copy(child)?),
            "request" => d.requests.push(build_request(child)?),
            // Documentation and elements this compiler has no use for.
            _ => {}
        }
    }
    Ok(d)
}

fn build_enum(e: &Element) -> Result<EnumDecl, String> {
    let name = e.required_attr("name")?.to_string();
    let mut items = Vec::new();
    for item in e.elements().filter(|c| c.name == "item") {
        let expr = match item.elements().find(|c| is_expr(c)) {
            Some(x) => Some(build_expr(x)?),
            None => None,
        };
        items.push(EnumItemDecl {
            name: item.required_attr("name")?.to_string(),
            expr,
        });
    }
    Ok(EnumDecl { name, items })
}

fn build_struct(e: &Element) -> Result<StructDecl, String> {
    Ok(StructDecl {
        name: e.required_attr("name")?.to_string(),
        fields: build_fields(e)?,
    })
}

fn build_copy(e: &Element) -> Result<CopyDecl, String> {
    Ok(CopyDecl {
        name: e.required_attr("name")?.to_string(),
        number: parse_number(e.required_attr("number")?, "number")?,
        reference: e.required_attr("ref")?.to_string(),
    })
}

fn build_request(e: &Element) -> Result<RequestDecl, String> {
    let reply = match e.elements().find(|c| c.name == "reply") {
        Some(r) => Some(build_fields(r)?),
        None => None,
    };
    Ok(RequestDecl {
        name: e.required_attr("name")?.to_string(),
        opcode: parse_number(e.required_attr("opcode")?, "opcode")?,
        combine: parse_bool(e.attr("combine-adjacent"))?,
        fields: build_fields(e)?,
        reply,
    })
}

/// Field children of a container; `reply` and `doc` are not fields.
fn build_fields(e: &Element) -> Result<Vec<FieldDecl>, String> {
    let mut fields = Vec::new();
    for child in e.elements() {
        match child.name.as_str() {
            "reply" | "doc" | "required_start_align" => continue,
            _ => fields.push(build_field(child)?),
        }
    }
    Ok(fields)
}

fn build_field(e: &Element) -> Result<FieldDecl, String> {
    let name = || e.required_attr("name").map(str::to_string);
    let ty = || e.required_attr("type").map(str::to_string);
    match e.name.as_str() {
        "pad" => {
            let bytes = e
                .attr("bytes")
                .map(|v| parse_number(v, "bytes"))
                .transpose()?
                .unwrap_or(0);
            let align = e
                .attr("align")
                .map(|v| parse_number(v, "align"))
                .transpose()?;
            Ok(FieldDecl::Pad { bytes, align })
        }
        "field" => Ok(FieldDecl::Field {
            name: name()?,
            ty: ty()?,
            hints: FieldHints {
                enum_name: e.attr("enum").map(str::to_string),
                mask: e.attr("mask").map(str::to_string),
                altenum: e.attr("altenum").map(str::to_string),
            },
        }),
        "list" => {
            let length = match e.elements().find(|c| is_expr(c)) {
                Some(x) => Some(build_expr(x)?),
                None => None,
            };
            Ok(FieldDecl::List {
                name: name()?,
                ty: ty()?,
                length,
            })
        }
        "localfield" => Ok(FieldDecl::LocalField {
            name: name()?,
            ty: ty()?,
        }),
        "exprfield" => {
            let x = e
                .elements()
                .find(|c| is_expr(c))
                .ok_or_else(|| format!("<exprfield name=\"{}\"> has no expression", name().unwrap_or_default()))?;
            Ok(FieldDecl::ExprField {
                name: name()?,
                ty: ty()?,
                expr: build_expr(x)?,
            })
        }
        "valueparam" => Ok(FieldDecl::ValueParam {
            mask_type: e.required_attr("value-mask-type")?.to_string(),
            mask_name: e.required_attr("value-mask-name")?.to_string(),
            list_name: e.required_attr("value-list-name")?.to_string(),
        }),
        "switch" => {
            let x = e
                .elements()
                .find(|c| is_expr(c))
                .ok_or_else(|| format!("<switch name=\"{}\"> has no expression", name().unwrap_or_default()))?;
            let mut bitcases = Vec::new();
            for bc in e.elements().filter(|c| c.name == "bitcase") {
                bitcases.push(build_bitcase(bc)?);
            }
            Ok(FieldDecl::Switch {
                name: name()?,
                expr: build_expr(x)?,
                bitcases,
            })
        }
        other => Err(format!("unrecognized field element <{}>", other)),
    }
}

fn build_bitcase(e: &Element) -> Result<BitcaseDecl, String> {
    let mut expr = None;
    let mut fields = Vec::new();
    for child in e.elements() {
        if child.name == "doc" {
            continue;
        }
        if expr.is_none() && is_expr(child) {
            expr = Some(build_expr(child)?);
        } else {
            fields.push(build_field(child)?);
        }
    }
    Ok(BitcaseDecl {
        expr: expr.ok_or("<bitcase> has no expression")?,
        fields,
    })
}

fn is_expr(e: &Element) -> bool {
    EXPR_TAGS.contains(&e.name.as_str())
}

fn build_expr(e: &Element) -> Result<ExprDecl, String> {
    let operands = || -> Result<Vec<ExprDecl>, String> {
        e.elements().filter(|c| is_expr(c)).map(build_expr).collect()
    };
    match e.name.as_str() {
        "op" => {
            let op = e.required_attr("op")?.to_string();
            let mut args = operands()?;
            if args.len() != 2 {
                return Err(format!("'op' found {} expressions; expected 2", args.len()));
            }
            let rhs = args.pop().map(Box::new).ok_or("op: rhs")?;
            let lhs = args.pop().map(Box::new).ok_or("op: lhs")?;
            Ok(ExprDecl::Op { op, lhs, rhs })
        }
        "unop" => {
            let op = e.required_attr("op")?.to_string();
            let mut args = operands()?;
            if args.len() != 1 {
                return Err(format!("'unop' found {} expressions; expected 1", args.len()));
            }
            let expr = args.pop().map(Box::new).ok_or("unop: operand")?;
            Ok(ExprDecl::Unop { op, expr })
        }
        "popcount" => {
            let mut args = operands()?;
            if args.len() != 1 {
                return Err(format!(
                    "'popcount' found {} expressions; expected 1",
                    args.len()
                ));
            }
            Ok(ExprDecl::PopCount(Box::new(args.remove(0))))
        }
        "value" => Ok(ExprDecl::Value(parse_int(&e.text())?)),
        "bit" => Ok(ExprDecl::Bit(parse_int(&e.text())?)),
        "fieldref" => Ok(ExprDecl::FieldRef(e.text())),
        "enumref" => Ok(ExprDecl::EnumRef {
            ty: e.required_attr("ref")?.to_string(),
            item: e.text(),
        }),
        "sumof" => Ok(ExprDecl::SumOf(e.required_attr("ref")?.to_string())),
        other => Err(format!(
            "unrecognized tag '{}' in expression context; expected one of {}",
            other,
            EXPR_TAGS.join(", ")
        )),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        s.parse::<i64>()
    };
    parsed.map_err(|_| format!("could not convert '{}' to an integer", s))
}

fn parse_number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, String> {
    s.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid {} '{}'", what, s))
}

fn parse_bool(v: Option<&str>) -> Result<bool, String> {
    match v.map(str::trim) {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(format!("invalid boolean '{}'", other)),
    }
}
