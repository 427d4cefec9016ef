//! Exporting globals to foreign code.
//!
//! A shared global converts foreign values on the way in and engine values
//! on the way out, going through its own access site.

use crate::accessor::AccessSite;
use crate::bridge::{foreign_to_primitive, to_engine, to_foreign};
use crate::context::ExecutionContext;
use crate::foreign::{ForeignObject, ForeignValue};
use crate::pointer::PointerValue;
use crate::value::{BoxedPrimitive, Value};
use bcvm_types::{AccessError, GlobalIndex, InteropError, MemberId, Type};
use std::fmt;
use std::sync::Arc;

/// A global exported to foreign code.
///
/// Foreign code sees the global as a one element array: the value lives at
/// index 0 and every other identifier is unknown.
pub struct SharedGlobal {
    context: Arc<ExecutionContext>,
    global: GlobalIndex,
    site: AccessSite,
}

impl SharedGlobal {
    pub(crate) fn new(context: Arc<ExecutionContext>, global: GlobalIndex) -> Self {
        let site = context.new_site();
        Self {
            context,
            global,
            site,
        }
    }

    /// The exported global.
    pub fn global(&self) -> GlobalIndex {
        self.global
    }

    /// The access site used for reads and writes of the global.
    pub fn site(&self) -> &AccessSite {
        &self.site
    }

    fn check_identifier(id: &MemberId) -> Result<(), InteropError> {
        match id {
            MemberId::Index(0) => Ok(()),
            _ => Err(InteropError::UnknownIdentifier {
                identifier: id.clone(),
                reason: "a shared global only has index 0".into(),
            }),
        }
    }

    fn declared_type(&self, id: &MemberId) -> Result<Type, InteropError> {
        self.context
            .globals()
            .symbol(self.global)
            .map(|symbol| symbol.ty().clone())
            .map_err(|err| rejected(id, err))
    }

    /// Convert a foreign value to what a pointer-typed global holds.
    fn pointer_value(value: ForeignValue) -> Result<Value, AccessError> {
        Ok(match value {
            ForeignValue::Null => Value::null(),
            ForeignValue::Object(object) => Value::Pointer(PointerValue::to_foreign(object)),
            ForeignValue::Engine(value) => value,
            other => Value::Boxed(BoxedPrimitive::new(&to_engine(other)?)?),
        })
    }
}

fn rejected(id: &MemberId, err: AccessError) -> InteropError {
    match err {
        AccessError::InteropBoundaryFault(err) => err,
        err => InteropError::UnsupportedType {
            identifier: id.clone(),
            reason: err.to_string(),
        },
    }
}

impl ForeignObject for SharedGlobal {
    fn read_member(&self, id: &MemberId) -> Result<ForeignValue, InteropError> {
        Self::check_identifier(id)?;
        let value = self
            .site
            .read(self.context.globals(), self.global)
            .map_err(|err| rejected(id, err))?;
        to_foreign(&value).map_err(|err| rejected(id, err))
    }

    fn write_member(&self, id: &MemberId, value: ForeignValue) -> Result<(), InteropError> {
        Self::check_identifier(id)?;
        let value = match self.declared_type(id)? {
            ty if ty.is_pointer() => Self::pointer_value(value),
            Type::Primitive(kind) => foreign_to_primitive(kind, &value),
            ty => Err(AccessError::UnsupportedKind(format!(
                "cannot write a foreign value into a global of type {ty}"
            ))),
        }
        .map_err(|err| rejected(id, err))?;
        self.site
            .write(self.context.globals(), self.global, value)
            .map_err(|err| rejected(id, err))
    }
}

impl fmt::Debug for SharedGlobal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGlobal")
            .field("context", &self.context.id())
            .field("global", &self.global)
            .finish()
    }
}
