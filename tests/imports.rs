//! Multi-module compiles: import search, cross-module references, cycles.

use std::fs;
use std::path::Path;

use wireidl::ir::{Field, ModuleSet, Type};
use wireidl::{compile, load, Config, Error, LoadOptions};

const XPROTO: &str = r#"<xcb header="xproto">
  <xidtype name="WINDOW"/>
  <struct name="POINT"><field type="INT16" name="x"/><field type="INT16" name="y"/></struct>
  <event name="Expose" number="12"><field type="WINDOW" name="window"/></event>
</xcb>"#;

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{}.xml", name)), source).expect("write description");
}

fn compile_in(dir: &Path, root: &str) -> Result<ModuleSet, Error> {
    compile(
        &dir.join(format!("{}.xml", root)),
        &LoadOptions::new(dir),
        &Config::default(),
    )
}

fn single_field_ref(set: &ModuleSet, ty: &str, index: usize) -> wireidl::ir::TypeRef {
    let root = set.root_module();
    let i = root.find_type(ty).expect("type");
    match &root.types[i].fields()[index] {
        Field::Single(f) => f.ty.clone(),
        other => panic!("unexpected {:?}", other),
    }
}

// ==================== Lookup across modules ====================

#[test]
fn imported_types_are_qualified() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "xproto", XPROTO);
    write(
        dir.path(),
        "shape",
        r#"<xcb header="shape" extension-xname="SHAPE" extension-name="Shape">
  <import>xproto</import>
  <struct name="Notify">
    <field type="WINDOW" name="affected"/>
    <field type="xproto:POINT" name="origin"/>
  </struct>
</xcb>"#,
    );
    let set = compile_in(dir.path(), "shape").expect("compile");
    assert_eq!(set.modules.len(), 2);
    assert_eq!(set.root_module().name, "shape");
    let xproto = set.find_module("xproto").expect("xproto");
    assert_eq!(set.root_module().imports, vec![xproto]);
    assert_eq!(set.module(xproto).parent, Some(set.root));

    let window = single_field_ref(&set, "Notify", 0);
    assert_eq!(window.id.module, xproto);
    assert_eq!(window.ident, "xproto::Window");
    let point = single_field_ref(&set, "Notify", 1);
    assert_eq!(point.ident, "xproto::Point");

    let notify = set.root_module().find_type("Notify").expect("Notify");
    let size = set
        .type_size(wireidl::ir::TypeId {
            module: set.root,
            index: notify,
        })
        .expect("size");
    assert_eq!(size.bytes(), Some(8));
}

#[test]
fn local_type_shadows_import() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "xproto", XPROTO);
    write(
        dir.path(),
        "ext",
        r#"<xcb header="ext">
  <import>xproto</import>
  <struct name="POINT"><field type="INT32" name="x"/></struct>
  <struct name="S">
    <field type="POINT" name="mine"/>
    <field type="XPROTO:POINT" name="theirs"/>
  </struct>
</xcb>"#,
    );
    let set = compile_in(dir.path(), "ext").expect("compile");
    let mine = single_field_ref(&set, "S", 0);
    let theirs = single_field_ref(&set, "S", 1);
    assert_eq!(mine.id.module, set.root);
    assert_eq!(mine.ident, "Point");
    assert_ne!(theirs.id.module, set.root);
    assert_eq!(theirs.ident, "xproto::Point");
}

#[test]
fn package_drops_underscores() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "xc_misc",
        r#"<xcb header="xc_misc"><xidtype name="RANGE_ID"/></xcb>"#,
    );
    write(
        dir.path(),
        "top",
        r#"<xcb header="top"><import>xc_misc</import><struct name="S"><field type="RANGE_ID" name="r"/></struct></xcb>"#,
    );
    let set = compile_in(dir.path(), "top").expect("compile");
    assert_eq!(single_field_ref(&set, "S", 0).ident, "xcmisc::RANGEID");
}

#[test]
fn eventcopy_of_imported_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "xproto", XPROTO);
    write(
        dir.path(),
        "ext",
        r#"<xcb header="ext"><import>xproto</import><eventcopy name="Exposed" number="1" ref="Expose"/></xcb>"#,
    );
    let set = compile_in(dir.path(), "ext").expect("compile");
    let root = set.root_module();
    let i = root.find_type("Exposed").expect("Exposed");
    match &root.types[i] {
        Type::EventAlias(c) => {
            assert_eq!(c.old.ident, "xproto::Expose");
            assert!(matches!(set.get(c.old.id), Type::Event(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn imports_are_not_transitive_for_lookup() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "xproto", XPROTO);
    write(dir.path(), "middle", r#"<xcb header="middle"><import>xproto</import></xcb>"#);
    write(
        dir.path(),
        "top",
        r#"<xcb header="top"><import>middle</import><struct name="S"><field type="WINDOW" name="w"/></struct></xcb>"#,
    );
    let err = compile_in(dir.path(), "top").unwrap_err();
    assert!(matches!(&err, Error::UnknownType { name, .. } if name == "WINDOW"), "{}", err);
}

// ==================== Loading ====================

#[test]
fn shared_import_is_loaded_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "xproto", XPROTO);
    write(dir.path(), "render", r#"<xcb header="render"><import>xproto</import></xcb>"#);
    write(dir.path(), "shape", r#"<xcb header="shape"><import>xproto</import></xcb>"#);
    write(
        dir.path(),
        "composite",
        r#"<xcb header="composite"><import>render</import><import>shape</import></xcb>"#,
    );
    let forest = load(&dir.path().join("composite.xml"), &LoadOptions::new(dir.path())).expect("load");
    let names: Vec<&str> = forest.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["xproto", "render", "shape", "composite"]);
    assert_eq!(forest.root, 3);
    // Every import precedes its importer.
    for (i, m) in forest.modules.iter().enumerate() {
        assert!(m.imports.iter().all(|&j| j < i), "{} imports a later module", m.name);
    }
    let xproto = forest.find("xproto").expect("xproto");
    assert_eq!(xproto.parent, Some(1));
}

#[test]
fn import_cycle_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a", r#"<xcb header="a"><import>b</import></xcb>"#);
    write(dir.path(), "b", r#"<xcb header="b"><import>a</import></xcb>"#);
    let err = compile_in(dir.path(), "a").unwrap_err();
    assert!(matches!(&err, Error::ImportCycle { name } if name == "a"), "{}", err);
}

#[test]
fn missing_import_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a", r#"<xcb header="a"><import>missing</import></xcb>"#);
    let err = compile_in(dir.path(), "a").unwrap_err();
    match &err {
        Error::Io { path, .. } => assert!(path.ends_with("missing.xml"), "{}", path.display()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(err.to_string().contains("missing.xml"));
}

#[test]
fn missing_root_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = compile_in(dir.path(), "nothing").unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{}", err);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a", r#"<xcb header="a"><import>b</import></xcb>"#);
    write(dir.path(), "b", r#"<xcb header="b"><struct name="S"></xcb>"#);
    let err = compile_in(dir.path(), "a").unwrap_err();
    match &err {
        Error::Parse { path, .. } => assert!(path.ends_with("b.xml"), "{}", path),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn duplicate_module_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a", r#"<xcb header="a"><import>b</import></xcb>"#);
    write(dir.path(), "b", r#"<xcb header="A"/>"#);
    let err = compile_in(dir.path(), "a").unwrap_err();
    assert!(matches!(err, Error::DuplicateModule { .. }), "{}", err);
}
