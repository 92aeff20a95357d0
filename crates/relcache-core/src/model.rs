//! Typed models over dynamic entities
//!
//! A [`Model`] is a thin newtype over [`EntityRef`] that pins the type name
//! and metadata at compile time and exposes typed accessors. The
//! [`model!`](crate::model!) macro generates one from a field list.

use std::sync::Arc;

use crate::entity::EntityRef;
use crate::metadata::EntityMetadata;

/// A statically described entity type
pub trait Model: Sized {
    /// Registered type name
    const NAME: &'static str;

    /// Describe the mapping; called once per process by [`Model::metadata`]
    fn describe() -> EntityMetadata;

    /// Shared metadata for this type
    fn metadata() -> Arc<EntityMetadata>;

    fn from_entity(entity: EntityRef) -> Self;

    fn entity(&self) -> &EntityRef;

    fn id(&self) -> Option<i64> {
        self.entity().id()
    }
}

/// Declare a typed entity model
///
/// Generates a newtype over [`EntityRef`] implementing [`Model`], with a
/// getter `field()` returning `Result<T>` and a setter `set_field(T)` per
/// declared field. Lazy, transient and relationship declarations go in the
/// optional `describe` block, which receives and returns the metadata
/// builder.
///
/// ```
/// use relcache_core::{model, ManyToOne};
///
/// model! {
///     /// A row of `bez`
///     pub struct Bez {
///         foreign_id: Option<i64>,
///     }
///     describe |meta| meta.many_to_one("fez", ManyToOne::new("Fez", "foreign_id", "id"))
/// }
///
/// let bez = Bez::new();
/// bez.set_foreign_id(Some(4)).unwrap();
/// assert_eq!(bez.foreign_id().unwrap(), Some(4));
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $( $field:ident : $ty:ty ),* $(,)?
        }
        $( describe |$meta:ident| $describe:expr )?
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone)]
        $vis struct $name($crate::EntityRef);

        impl $crate::Model for $name {
            const NAME: &'static str = stringify!($name);

            fn describe() -> $crate::EntityMetadata {
                let builder = $crate::EntityMetadata::builder(stringify!($name))
                    $( .column(stringify!($field)) )*;
                $( let builder = {
                    let $meta = builder;
                    $describe
                }; )?
                builder.build()
            }

            fn metadata() -> ::std::sync::Arc<$crate::EntityMetadata> {
                static METADATA: ::std::sync::OnceLock<::std::sync::Arc<$crate::EntityMetadata>> =
                    ::std::sync::OnceLock::new();
                METADATA
                    .get_or_init(|| ::std::sync::Arc::new(<Self as $crate::Model>::describe()))
                    .clone()
            }

            fn from_entity(entity: $crate::EntityRef) -> Self {
                Self(entity)
            }

            fn entity(&self) -> &$crate::EntityRef {
                &self.0
            }
        }

        impl AsRef<$crate::EntityRef> for $name {
            fn as_ref(&self) -> &$crate::EntityRef {
                &self.0
            }
        }

        impl $name {
            /// Create a new, never-persisted instance
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($crate::EntityRef::new(<Self as $crate::Model>::metadata()))
            }

            $crate::__paste::paste! {
                $(
                    pub fn $field(&self) -> $crate::Result<$ty> {
                        self.0.get_as::<$ty>(stringify!($field))
                    }

                    pub fn [<set_ $field>](&self, value: $ty) -> $crate::Result<()> {
                        self.0.set(stringify!($field), value)
                    }
                )*
            }
        }
    };
}
