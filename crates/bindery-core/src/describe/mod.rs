//! Explicit type description.
//!
//! The pipeline never inspects Rust types directly. Instead every command and
//! result type is described by a [`TypeDescriptor`] held in a [`TypeCatalog`].
//! Descriptors come from three places:
//!
//! - hand-written builders (`TypeDescriptor::object(..).property(..)`)
//! - the function-app manifest read by the CLI
//! - `#[derive(Describe)]` from the `bindery` facade crate
//!
//! The [`Describe`] trait is the glue the derive targets; it is implemented
//! here for the std types that map onto scalar, sequence and map schemas.

mod catalog;
mod types;

use std::collections::{BTreeMap, HashMap};

pub use catalog::TypeCatalog;
pub use types::{
    Capability, Contract, PropertyDescriptor, ScalarType, TypeDescriptor, TypeKind, TypeRef,
    Visibility,
};

/// A Rust type that can describe its public shape.
pub trait Describe {
    /// Reference used wherever this type appears as a property or payload.
    fn type_ref() -> TypeRef;

    /// Add this type, and every named type it references, to the catalog.
    ///
    /// Implementations for named types must insert themselves before
    /// registering their property types so recursive types terminate.
    fn register(catalog: &mut TypeCatalog) {
        let _ = catalog;
    }
}

macro_rules! describe_scalar {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::Scalar(ScalarType::$scalar)
                }
            }
        )*
    };
}

describe_scalar! {
    String => String,
    str => String,
    char => Char,
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    uuid::Uuid => Guid,
    std::time::Duration => Duration,
}

impl<T: Describe> Describe for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::sequence(T::type_ref())
    }

    fn register(catalog: &mut TypeCatalog) {
        T::register(catalog);
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::optional(T::type_ref())
    }

    fn register(catalog: &mut TypeCatalog) {
        T::register(catalog);
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn register(catalog: &mut TypeCatalog) {
        T::register(catalog);
    }
}

impl<V: Describe, S> Describe for HashMap<String, V, S> {
    fn type_ref() -> TypeRef {
        TypeRef::map(V::type_ref())
    }

    fn register(catalog: &mut TypeCatalog) {
        V::register(catalog);
    }
}

impl<V: Describe> Describe for BTreeMap<String, V> {
    fn type_ref() -> TypeRef {
        TypeRef::map(V::type_ref())
    }

    fn register(catalog: &mut TypeCatalog) {
        V::register(catalog);
    }
}
