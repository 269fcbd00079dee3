//! Contract between the compiler core and a code generation backend.
//!
//! A backend sees only the resolved [`ModuleSet`]. By the time any hook runs,
//! every type, field and request has its output identifier and its size can
//! be computed with the layout methods on the set.

use tracing::trace;

use crate::error::Error;
use crate::ir::*;

/// Prefix through which generated read/write code reaches the instance's fields.
pub const INSTANCE_PREFIX: &str = "v.";

/// Something a backend emits code for.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    Type {
        id: TypeId,
        ty: &'a Type<Resolved>,
    },
    Request {
        module: ModuleId,
        request: &'a Request<Resolved>,
    },
}

impl<'a> Item<'a> {
    pub fn xml_name(&self) -> &'a str {
        match self {
            Item::Type { ty, .. } => ty.xml_name(),
            Item::Request { request, .. } => &request.name.xml,
        }
    }
}

pub trait Backend {
    type Output;

    /// Emit the declaration of an item.
    fn define(&mut self, set: &ModuleSet, item: &Item<'_>) -> Result<(), Error>;

    /// Emit code decoding an item from a byte buffer; fields are reached through `prefix`.
    fn read(&mut self, set: &ModuleSet, item: &Item<'_>, prefix: &str) -> Result<(), Error>;

    /// Emit code encoding an item into a byte buffer; fields are reached through `prefix`.
    fn write(&mut self, set: &ModuleSet, item: &Item<'_>, prefix: &str) -> Result<(), Error>;

    fn finish(self) -> Self::Output;
}

/// Visit every non-primitive type of the root module in declaration order,
/// then every request, calling define, read and write on each.
pub fn emit<B: Backend>(set: &ModuleSet, mut backend: B) -> Result<B::Output, Error> {
    let root = set.root;
    let module = set.module(root);
    let types = module
        .types
        .iter()
        .enumerate()
        .filter(|(_, ty)| !matches!(ty, Type::Primitive(_)))
        .map(|(index, ty)| Item::Type {
            id: TypeId {
                module: root,
                index,
            },
            ty,
        });
    let requests = module.requests.iter().map(|request| Item::Request {
        module: root,
        request,
    });
    for item in types.chain(requests) {
        trace!(item = item.xml_name(), "emitting");
        backend.define(set, &item)?;
        backend.read(set, &item, INSTANCE_PREFIX)?;
        backend.write(set, &item, INSTANCE_PREFIX)?;
    }
    Ok(backend.finish())
}
