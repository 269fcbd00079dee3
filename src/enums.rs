//! Give every enum item a value.
//!
//! Items are walked in declaration order with a counter starting at 0. An item
//! with an explicit value keeps it and sets the counter to value + 1; an item
//! without one takes the counter and advances it.

use tracing::debug;

use crate::error::Error;
use crate::expr::Expr;
use crate::ir::*;

/// Number the items of every enum in every module.
pub fn number_enums(set: &mut ModuleSet) -> Result<(), Error> {
    for module in &mut set.modules {
        for ty in &mut module.types {
            if let Type::Enum(e) = ty {
                number_items(&mut e.items)?;
                debug!(
                    module = %module.name,
                    name = %e.name.xml,
                    items = e.items.len(),
                    "numbered enum"
                );
            }
        }
    }
    Ok(())
}

pub fn number_items<S: Stage>(items: &mut [EnumItem<S>]) -> Result<(), Error> {
    // None once an explicit value has reached i64::MAX.
    let mut next = Some(0i64);
    for item in items {
        let value = match &item.expr {
            Some(e) => e.eval()?,
            None => {
                let v = next.ok_or_else(|| Error::EnumOverflow {
                    item: S::xml_name(&item.name).to_string(),
                })?;
                item.expr = Some(Expr::Literal(v));
                v
            }
        };
        next = value.checked_add(1);
    }
    Ok(())
}

/// Value of an item after numbering.
pub fn item_value<S: Stage>(item: &EnumItem<S>) -> Option<i64> {
    item.expr.as_ref().and_then(|e| e.eval().ok())
}
