//! XML reader and description schema: what is accepted, what is rejected, and
//! how elements map onto raw declarations.

use wireidl::raw::{self, ExprDecl, FieldDecl};
use wireidl::xml::{parse_document, Node};

// ==================== XML reader ====================

#[test]
fn prolog_comments_and_doctype_are_skipped() {
    let src = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE xcb>
<!-- leading comment -->
<xcb header="t">
  <!-- inner comment -->
  <xidtype name="WINDOW"/>
</xcb>
<!-- trailing comment -->
"#;
    let root = parse_document(src).expect("parse");
    assert_eq!(root.name, "xcb");
    assert_eq!(root.attr("header"), Some("t"));
    let children: Vec<&str> = root.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(children, vec!["xidtype"]);
}

#[test]
fn attribute_quotes_and_entities() {
    let root = parse_document(r#"<op op='&amp;' note="a &lt; b"/>"#).expect("parse");
    assert_eq!(root.attr("op"), Some("&"));
    assert_eq!(root.attr("note"), Some("a < b"));
    assert!(root.children.is_empty());
}

#[test]
fn doctype_with_internal_subset() {
    let src = r#"<?xml version="1.0"?>
<!DOCTYPE xcb [
  <!ELEMENT xcb ANY>
  <!ATTLIST xcb header CDATA #REQUIRED>
]>
<xcb header="t"><import>xproto</import></xcb>"#;
    let root = parse_document(src).expect("parse");
    assert_eq!(root.attr("header"), Some("t"));
    assert_eq!(root.elements().count(), 1);
}

#[test]
fn text_and_cdata() {
    let root = parse_document("<doc>  one &amp; <![CDATA[<two>]]>  </doc>").expect("parse");
    assert_eq!(root.text(), "one & <two>");
    assert!(root.children.iter().all(|c| matches!(c, Node::Text(_))));
}

#[test]
fn character_references() {
    let root = parse_document("<value>&#65;&#x42;</value>").expect("parse");
    assert_eq!(root.text(), "AB");
    assert!(parse_document("<value>&bogus;</value>").is_err());
}

#[test]
fn malformed_documents_are_rejected() {
    assert!(parse_document("").is_err());
    assert!(parse_document("<a>").is_err());
    assert!(parse_document("<a></b>").is_err());
    assert!(parse_document("<a x=1/>").is_err());
    assert!(parse_document("<a/><b/>").is_err());
    assert!(parse_document(r#"<a x="1" x="2"/>"#).is_err());
    assert!(parse_document("<a>x & y</a>").is_err());
}

// ==================== Schema: declarations ====================

#[test]
fn root_attributes() {
    let d = raw::parse(
        r#"<xcb header="shape" extension-xname="SHAPE" extension-name="Shape"
               major-version="1" minor-version="1">
  <import>xproto</import>
</xcb>"#,
    )
    .expect("parse");
    assert_eq!(d.header, "shape");
    assert_eq!(d.extension_xname.as_deref(), Some("SHAPE"));
    assert_eq!(d.extension_name.as_deref(), Some("Shape"));
    assert_eq!(d.major_version, Some(1));
    assert_eq!(d.minor_version, Some(1));
    assert_eq!(d.imports, vec!["xproto".to_string()]);
}

#[test]
fn root_must_be_xcb_with_header() {
    let err = raw::parse(r#"<protocol header="t"/>"#).unwrap_err();
    assert!(err.contains("<xcb>"), "{}", err);
    let err = raw::parse("<xcb/>").unwrap_err();
    assert!(err.contains("header"), "{}", err);
}

#[test]
fn declarations_are_collected_by_kind() {
    let d = raw::parse(
        r#"<xcb header="t">
  <xidtype name="WINDOW"/>
  <xidunion name="DRAWABLE"><type>WINDOW</type></xidunion>
  <typedef oldname="CARD32" newname="VISUALID"/>
  <enum name="Gravity"><item name="Forget"><value>0</value></item><item name="Static"/></enum>
  <struct name="POINT"><field type="INT16" name="x"/><field type="INT16" name="y"/></struct>
  <union name="ClientMessageData"><list type="CARD8" name="data8"><value>20</value></list></union>
  <event name="KeyPress" number="2"><field type="CARD32" name="time"/></event>
  <event name="Keymap" number="11" no-sequence-number="true"><list type="CARD8" name="keys"><value>31</value></list></event>
  <eventcopy name="KeyRelease" number="3" ref="KeyPress"/>
  <error name="Request" number="1"><field type="CARD32" name="bad_value"/></error>
  <errorcopy name="Value" number="2" ref="Request"/>
  <doc>ignored</doc>
</xcb>"#,
    )
    .expect("parse");
    assert_eq!(d.xids, vec!["WINDOW"]);
    assert_eq!(d.xid_unions, vec!["DRAWABLE"]);
    assert_eq!(d.typedefs[0].old, "CARD32");
    assert_eq!(d.typedefs[0].new, "VISUALID");
    assert_eq!(d.enums[0].items.len(), 2);
    assert_eq!(d.enums[0].items[0].expr, Some(ExprDecl::Value(0)));
    assert_eq!(d.enums[0].items[1].expr, None);
    assert_eq!(d.structs[0].fields.len(), 2);
    assert_eq!(d.unions[0].name, "ClientMessageData");
    assert_eq!(d.events.len(), 2);
    assert!(!d.events[0].no_sequence);
    assert!(d.events[1].no_sequence);
    assert_eq!(d.event_copies[0].reference, "KeyPress");
    assert_eq!(d.event_copies[0].number, 3);
    assert_eq!(d.errors[0].number, 1);
    assert_eq!(d.error_copies[0].reference, "Request");
}

#[test]
fn request_with_reply() {
    let d = raw::parse(
        r#"<xcb header="t">
  <request name="GetGeometry" opcode="14" combine-adjacent="true">
    <pad bytes="1"/>
    <field type="CARD32" name="drawable"/>
    <reply>
      <field type="CARD8" name="depth"/>
      <field type="CARD32" name="root"/>
      <doc><brief>ignored</brief></doc>
    </reply>
    <doc>ignored</doc>
  </request>
</xcb>"#,
    )
    .expect("parse");
    let r = &d.requests[0];
    assert_eq!(r.opcode, 14);
    assert!(r.combine);
    assert_eq!(r.fields.len(), 2);
    assert!(matches!(r.fields[0], FieldDecl::Pad { bytes: 1, align: None }));
    assert_eq!(r.reply.as_ref().map(Vec::len), Some(2));
}

// ==================== Schema: fields and expressions ====================

#[test]
fn field_elements() {
    let d = raw::parse(
        r#"<xcb header="t">
  <struct name="S">
    <pad align="4"/>
    <field type="CARD8" name="kind" enum="Kind" mask="KindMask" altenum="Other"/>
    <list type="CARD8" name="name"><fieldref>name_len</fieldref></list>
    <list type="CARD8" name="rest"/>
    <localfield type="CARD16" name="count"/>
    <exprfield type="BOOL" name="odd"><op op="&amp;"><fieldref>count</fieldref><value>1</value></op></exprfield>
    <valueparam value-mask-type="CARD32" value-mask-name="value_mask" value-list-name="value_list"/>
  </struct>
</xcb>"#,
    )
    .expect("parse");
    let f = &d.structs[0].fields;
    assert!(matches!(f[0], FieldDecl::Pad { bytes: 0, align: Some(4) }));
    match &f[1] {
        FieldDecl::Field { name, ty, hints } => {
            assert_eq!((name.as_str(), ty.as_str()), ("kind", "CARD8"));
            assert_eq!(hints.enum_name.as_deref(), Some("Kind"));
            assert_eq!(hints.mask.as_deref(), Some("KindMask"));
            assert_eq!(hints.altenum.as_deref(), Some("Other"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(&f[2], FieldDecl::List { length: Some(ExprDecl::FieldRef(n)), .. } if n == "name_len"));
    assert!(matches!(&f[3], FieldDecl::List { length: None, .. }));
    assert!(matches!(&f[4], FieldDecl::LocalField { .. }));
    match &f[5] {
        FieldDecl::ExprField { expr: ExprDecl::Op { op, .. }, .. } => assert_eq!(op, "&"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(&f[6], FieldDecl::ValueParam { mask_name, .. } if mask_name == "value_mask"));
}

#[test]
fn switch_with_bitcases() {
    let d = raw::parse(
        r#"<xcb header="t">
  <struct name="S">
    <field type="CARD32" name="mask"/>
    <switch name="values">
      <fieldref>mask</fieldref>
      <bitcase>
        <enumref ref="CW">BackPixel</enumref>
        <field type="CARD32" name="background_pixel"/>
      </bitcase>
      <bitcase>
        <bit>3</bit>
        <field type="CARD32" name="border_pixel"/>
        <pad bytes="2"/>
      </bitcase>
    </switch>
  </struct>
</xcb>"#,
    )
    .expect("parse");
    match &d.structs[0].fields[1] {
        FieldDecl::Switch {
            name,
            expr,
            bitcases,
        } => {
            assert_eq!(name, "values");
            assert_eq!(*expr, ExprDecl::FieldRef("mask".to_string()));
            assert_eq!(bitcases.len(), 2);
            assert_eq!(
                bitcases[0].expr,
                ExprDecl::EnumRef {
                    ty: "CW".to_string(),
                    item: "BackPixel".to_string()
                }
            );
            assert_eq!(bitcases[1].expr, ExprDecl::Bit(3));
            assert_eq!(bitcases[1].fields.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn expression_elements() {
    let d = raw::parse(
        r#"<xcb header="t">
  <enum name="E">
    <item name="Hex"><value>0x10</value></item>
    <item name="Not"><unop op="~"><value>0</value></unop></item>
    <item name="Count"><popcount><value>7</value></popcount></item>
  </enum>
  <struct name="S">
    <list type="CARD8" name="xs"><sumof ref="lengths"/></list>
  </struct>
</xcb>"#,
    )
    .expect("parse");
    let items = &d.enums[0].items;
    assert_eq!(items[0].expr, Some(ExprDecl::Value(16)));
    assert!(matches!(&items[1].expr, Some(ExprDecl::Unop { op, .. }) if op == "~"));
    assert!(matches!(&items[2].expr, Some(ExprDecl::PopCount(_))));
    assert!(matches!(
        &d.structs[0].fields[0],
        FieldDecl::List { length: Some(ExprDecl::SumOf(r)), .. } if r == "lengths"
    ));
}

#[test]
fn schema_errors() {
    let unknown_field = raw::parse(r#"<xcb header="t"><struct name="S"><blob name="x"/></struct></xcb>"#)
        .unwrap_err();
    assert!(unknown_field.contains("<blob>"), "{}", unknown_field);

    let missing_type = raw::parse(r#"<xcb header="t"><struct name="S"><field name="x"/></struct></xcb>"#)
        .unwrap_err();
    assert!(missing_type.contains("'type'"), "{}", missing_type);

    let bad_value = raw::parse(
        r#"<xcb header="t"><enum name="E"><item name="A"><value>ten</value></item></enum></xcb>"#,
    )
    .unwrap_err();
    assert!(bad_value.contains("ten"), "{}", bad_value);

    let bad_bool = raw::parse(
        r#"<xcb header="t"><event name="E" number="1" no-sequence-number="yes"/></xcb>"#,
    )
    .unwrap_err();
    assert!(bad_bool.contains("yes"), "{}", bad_bool);

    let no_expr = raw::parse(
        r#"<xcb header="t"><struct name="S"><exprfield type="CARD8" name="x"/></struct></xcb>"#,
    )
    .unwrap_err();
    assert!(no_expr.contains("no expression"), "{}", no_expr);
}
