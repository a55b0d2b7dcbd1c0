// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`tagged_display!`] — `as_tag()` + `Display` for unit-variant enums
//! - [`define_id!`] — prefixed, time-ordered newtype IDs over [`crate::id::IdBuf`]
//! - [`test_builder!`] — test-data builder seeded with complete defaults

/// Generate `as_tag()` and a delegating `Display` for a unit-variant enum,
/// mapping each variant to its wire tag.
///
/// Every status/kind enum in the runtime is a plain tag set, so the macro
/// deliberately supports nothing else — a data-carrying variant is a
/// compile error, which is the reminder to model it as a record instead.
///
/// ```ignore
/// charter_core::tagged_display! {
///     MyEnum {
///         Foo => "foo",
///         Bar => "bar",
///     }
/// }
/// ```
#[macro_export]
macro_rules! tagged_display {
    ($enum:ty { $( $variant:ident => $tag:literal ),+ $(,)? }) => {
        impl $enum {
            /// Wire tag for this variant.
            pub fn as_tag(&self) -> &'static str {
                match self {
                    $( Self::$variant => $tag, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_tag())
            }
        }
    };
}

/// Define a prefixed newtype ID over [`crate::id::IdBuf`].
///
/// The format is `{prefix}{uuid_v7}`: a 4-character type tag followed by a
/// 36-character hyphenated UUID, 40 bytes total — exactly the inline
/// capacity. The v7 timestamp prefix makes freshly generated IDs sort
/// after older ones within a type, which the event-log dedup and lease
/// tokens rely on.
///
/// Only the surface the runtime actually calls is generated:
/// construction (`new`, `from_string`), string access (`as_str`,
/// `Display`), and the `From`/`PartialEq` impls that keep call sites and
/// assertions terse.
///
/// ```ignore
/// charter_core::define_id! {
///     /// Doc comment for the ID type.
///     pub struct RunId("run-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::id::IdBuf);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh time-ordered ID with the type prefix.
            pub fn new() -> Self {
                Self($crate::id::IdBuf::new(&format!(
                    "{}{}",
                    Self::PREFIX,
                    uuid::Uuid::now_v7()
                )))
            }

            /// Wrap an existing identifier (parsing, caller-supplied IDs).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self($crate::id::IdBuf::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }
    };
}

/// Generate a test-data builder seeded with complete defaults.
///
/// The generated type wraps a fully constructed `$target`: `defaults`
/// must cover every field with a full default expression, setters
/// overwrite in place, and `build()` unwraps. Setter flavors:
///
/// - `into { field: Type }` — setter takes `impl Into<Type>`
/// - `with { field: Type }` — setter takes `Type` directly
///
/// Declare only the setters tests use; covering every field is the
/// defaults block's job, not the setter lists'. All generated items are
/// gated behind `#[cfg(any(test, feature = "test-support"))]`.
///
/// ```ignore
/// charter_core::test_builder! {
///     pub struct FooBuilder => Foo {
///         defaults {
///             name: "test".to_string(),
///             count: 0,
///             label: None,
///         }
///         into { name: String }
///         with { count: u32 }
///     }
/// }
/// ```
#[macro_export]
macro_rules! test_builder {
    (
        pub struct $builder:ident => $target:ident {
            defaults {
                $( $field:ident : $default:expr ),+ $(,)?
            }
            $(into {
                $( $into_field:ident : $into_ty:ty ),* $(,)?
            })?
            $(with {
                $( $with_field:ident : $with_ty:ty ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder($target);

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            fn seed() -> $target {
                $target {
                    $( $field: $default, )+
                }
            }

            $($(
                pub fn $into_field(mut self, v: impl Into<$into_ty>) -> Self {
                    self.0.$into_field = v.into();
                    self
                }
            )*)?

            $($(
                pub fn $with_field(mut self, v: $with_ty) -> Self {
                    self.0.$with_field = v;
                    self
                }
            )*)?

            pub fn build(self) -> $target {
                self.0
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Builder seeded with test defaults.
            pub fn builder() -> $builder {
                $builder($builder::seed())
            }
        }
    };
}
