//! Declarative macros for setting-style enums.
//!
//! Configuration values arrive as text (`"PARTIAL"`, `"SIMPLE"`, `"READ_COMMITTED"`) and
//! must round-trip back to the same spelling. [`string_enum!`] generates the enum together
//! with `as_str`, `FromStr`, `Display` and a string-valued `Serialize`.

/// Define an enum whose variants map one-to-one onto upper-case configuration names.
///
/// # Example
///
/// ```ignore
/// string_enum! {
///     /// Local cache scope.
///     pub enum LocalCacheScope {
///         Session => "SESSION",
///         Statement => "STATEMENT",
///     }
/// }
/// ```
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The configuration spelling of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(format!(
                        "No enum constant {}.{}",
                        stringify!($name),
                        other
                    )),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}
