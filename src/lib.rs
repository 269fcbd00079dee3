//! # wireidl: compiler front end for XML protocol descriptions
//!
//! Reads an XCB-style XML protocol description (and every module it imports),
//! builds a typed intermediate representation, resolves every type reference,
//! numbers enum items and computes wire sizes. Backends then walk the resolved
//! set through the [`Backend`] contract.
//!
//! ## Pipeline
//!
//! 1. [`loader`]: read the root file and its imports, parse each with [`raw`]
//! 2. [`translate`]: raw declarations to the unresolved IR
//! 3. [`resolve`]: placeholders to type ids, names to output identifiers
//! 4. [`enums`]: give every enum item a value
//! 5. [`layout::check`]: compute every size so layout errors surface early
//!
//! ## Example
//!
//! ```no_run
//! use wireidl::{compile, emit, Config, LayoutReport, LoadOptions};
//!
//! let options = LoadOptions::new("xcb-proto/src");
//! let set = compile("xcb-proto/src/xproto.xml".as_ref(), &options, &Config::default())?;
//! let report = emit(&set, LayoutReport::new())?;
//! print!("{}", report);
//! # Ok::<(), wireidl::Error>(())
//! ```

use std::path::Path;

use tracing::info;

pub mod backend;
pub mod config;
pub mod enums;
pub mod error;
pub mod expr;
pub mod ir;
pub mod layout;
pub mod loader;
pub mod raw;
pub mod report;
pub mod resolve;
pub mod translate;
pub mod xml;

pub use backend::{emit, Backend, Item};
pub use config::Config;
pub use enums::number_enums;
pub use error::Error;
pub use ir::{ModuleSet, Resolved, Translated, Unresolved};
pub use layout::Size;
pub use loader::{load, load_str, LoadOptions, RawForest};
pub use report::LayoutReport;
pub use resolve::resolve;
pub use translate::translate;

/// Load, translate, resolve, number and size-check the description at `root`.
pub fn compile(root: &Path, options: &LoadOptions, config: &Config) -> Result<ModuleSet, Error> {
    let forest = load(root, options)?;
    finish(&forest, config)
}

/// Same as [`compile`] for an in-memory root description.
pub fn compile_str(source: &str, options: &LoadOptions, config: &Config) -> Result<ModuleSet, Error> {
    let forest = load_str(source, options)?;
    finish(&forest, config)
}

fn finish(forest: &RawForest, config: &Config) -> Result<ModuleSet, Error> {
    let translated = translate(forest, config)?;
    let mut set = resolve(&translated, config)?;
    number_enums(&mut set)?;
    layout::check(&set)?;
    let root = set.root_module();
    info!(
        module = %root.name,
        modules = set.modules.len(),
        types = root.types.len(),
        requests = root.requests.len(),
        "compiled"
    );
    Ok(set)
}
