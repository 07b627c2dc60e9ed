//! Enums with a fixed name/ordinal table.
//!
//! [`wire_enum!`] declares a fieldless enum together with a static table that
//! maps every member to its persisted ordinal and its wire name. Serialization
//! writes either the ordinal or the name; deserialization accepts both and
//! rejects anything that is not in the table.

/// Declares an enum backed by a static name/ordinal table.
///
/// ```ignore
/// wire_enum! {
///     pub enum Color as ordinal {
///         Red = 0 => "red",
///         Blue = 1 => "blue",
///     }
/// }
/// ```
///
/// `as ordinal` serializes members as integers, `as name` as strings.
macro_rules! wire_enum {
    (@as_ordinal ordinal) => {
        true
    };
    (@as_ordinal name) => {
        false
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $repr:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $ordinal:literal => $wire:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every member with its ordinal and wire name.
            pub const TABLE: &'static [($name, i32, &'static str)] = &[
                $( ($name::$variant, $ordinal, $wire), )+
            ];

            /// The persisted integer value.
            pub const fn ordinal(self) -> i32 {
                match self {
                    $( $name::$variant => $ordinal, )+
                }
            }

            /// The wire name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }

            /// Looks a member up by ordinal.
            pub fn from_ordinal(value: i64) -> Option<Self> {
                Self::TABLE
                    .iter()
                    .find(|(_, ordinal, _)| i64::from(*ordinal) == value)
                    .map(|(member, _, _)| *member)
            }

            /// Looks a member up by wire name, variant name or ordinal digits.
            /// Names compare case-insensitively.
            pub fn parse_name(value: &str) -> Option<Self> {
                let value = value.trim();
                if let Ok(ordinal) = value.parse::<i64>() {
                    return Self::from_ordinal(ordinal);
                }
                Self::TABLE
                    .iter()
                    .find(|(member, _, wire)| {
                        wire.eq_ignore_ascii_case(value)
                            || format!("{member:?}").eq_ignore_ascii_case(value)
                    })
                    .map(|(member, _, _)| *member)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_name(s).ok_or_else(|| $crate::error::ValidationError::InvalidArgument {
                    message: format!("unknown {} value: {s}", stringify!($name)),
                })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if $crate::types::wire::wire_enum!(@as_ordinal $repr) {
                    serializer.serialize_i32(self.ordinal())
                } else {
                    serializer.serialize_str(self.as_str())
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct WireVisitor;

                impl<'de> serde::de::Visitor<'de> for WireVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "a {} name or ordinal", stringify!($name))
                    }

                    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<$name, E> {
                        $name::from_ordinal(v).ok_or_else(|| {
                            E::invalid_value(serde::de::Unexpected::Signed(v), &self)
                        })
                    }

                    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<$name, E> {
                        i64::try_from(v)
                            .ok()
                            .and_then($name::from_ordinal)
                            .ok_or_else(|| {
                                E::invalid_value(serde::de::Unexpected::Unsigned(v), &self)
                            })
                    }

                    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<$name, E> {
                        $name::parse_name(v).ok_or_else(|| {
                            E::invalid_value(serde::de::Unexpected::Str(v), &self)
                        })
                    }
                }

                deserializer.deserialize_any(WireVisitor)
            }
        }
    };
}

pub(crate) use wire_enum;
