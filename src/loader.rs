//! Load a root description file and, recursively, every module it imports.
//!
//! Imports are found as `<search-dir>/<name>.xml`. Each import is read and
//! parsed once; the resulting forest is ordered so that every module comes
//! after all of its imports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Error;
use crate::raw::{self, Description};

pub const DESCRIPTION_EXTENSION: &str = "xml";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory searched for imported modules.
    pub search_dir: PathBuf,
}

impl LoadOptions {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        LoadOptions {
            search_dir: search_dir.into(),
        }
    }
}

/// One parsed description file.
#[derive(Debug, Clone)]
pub struct RawModule {
    /// Module name (the `header` attribute).
    pub name: String,
    /// File it was read from; `None` for in-memory sources.
    pub path: Option<PathBuf>,
    pub description: Description,
    /// Forest indices of the imported modules, in declaration order.
    pub imports: Vec<usize>,
    /// Forest index of the module that first imported this one.
    pub parent: Option<usize>,
}

/// All modules of one compile, imports before importers. The root is last.
#[derive(Debug, Clone)]
pub struct RawForest {
    pub modules: Vec<RawModule>,
    pub root: usize,
}

impl RawForest {
    pub fn find(&self, name: &str) -> Option<&RawModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// Load the root file at `root` and its transitive imports.
pub fn load(root: &Path, options: &LoadOptions) -> Result<RawForest, Error> {
    let description = read_description(root)?;
    info!(module = %description.header, path = %root.display(), "loaded root description");
    let mut loader = Loader::new(options);
    let key = description.header.clone();
    let root = loader.visit(key, description, Some(root.to_path_buf()))?;
    loader.finish(root)
}

/// Load an in-memory root description; imports still come from the search directory.
pub fn load_str(source: &str, options: &LoadOptions) -> Result<RawForest, Error> {
    let description = raw::parse(source).map_err(|m| Error::parse("<memory>", m))?;
    let mut loader = Loader::new(options);
    let key = description.header.clone();
    let root = loader.visit(key, description, None)?;
    loader.finish(root)
}

fn read_description(path: &Path) -> Result<Description, Error> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    raw::parse(&source).map_err(|m| Error::parse(path.display().to_string(), m))
}

struct Loader<'a> {
    options: &'a LoadOptions,
    modules: Vec<RawModule>,
    /// Import key -> forest index, for finished modules.
    index: HashMap<String, usize>,
    /// Keys of modules whose imports are being loaded.
    stack: Vec<String>,
    /// Import key -> key of the module that first imported it.
    parents: HashMap<String, String>,
}

impl<'a> Loader<'a> {
    fn new(options: &'a LoadOptions) -> Self {
        Loader {
            options,
            modules: Vec::new(),
            index: HashMap::new(),
            stack: Vec::new(),
            parents: HashMap::new(),
        }
    }

    fn visit(
        &mut self,
        key: String,
        description: Description,
        path: Option<PathBuf>,
    ) -> Result<usize, Error> {
        self.stack.push(key.clone());
        let mut imports = Vec::with_capacity(description.imports.len());
        for name in &description.imports {
            if let Some(&i) = self.index.get(name) {
                debug!(import = %name, importer = %key, "import already loaded");
                imports.push(i);
                continue;
            }
            if self.stack.contains(name) {
                return Err(Error::ImportCycle { name: name.clone() });
            }
            let import_path = self
                .options
                .search_dir
                .join(format!("{}.{}", name, DESCRIPTION_EXTENSION));
            let imported = read_description(&import_path)?;
            info!(module = %name, path = %import_path.display(), importer = %key, "loaded import");
            self.parents
                .entry(name.clone())
                .or_insert_with(|| key.clone());
            imports.push(self.visit(name.clone(), imported, Some(import_path))?);
        }
        self.stack.pop();

        let i = self.modules.len();
        self.modules.push(RawModule {
            name: description.header.clone(),
            path,
            description,
            imports,
            parent: None,
        });
        self.index.insert(key, i);
        Ok(i)
    }

    fn finish(mut self, root: usize) -> Result<RawForest, Error> {
        for (i, m) in self.modules.iter().enumerate() {
            if self.modules[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&m.name))
            {
                return Err(Error::DuplicateModule {
                    name: m.name.clone(),
                });
            }
        }
        let keys: Vec<(String, usize)> = self.index.iter().map(|(k, &i)| (k.clone(), i)).collect();
        for (key, i) in keys {
            if let Some(parent) = self.parents.get(&key) {
                self.modules[i].parent = self.index.get(parent).copied();
            }
        }
        Ok(RawForest {
            modules: self.modules,
            root,
        })
    }
}
