//! Closed enumerations with a fixed wire spelling.
//!
//! Every status/kind enum in the domain is declared through [`wire_enum!`]. The
//! macro generates `as_str`, `Display`, a strict `FromStr` (unknown spellings
//! are `DomainError::Validation`), and serde impls that go through the same
//! string mapping, so storage and HTTP never see a value outside the set.

#[doc(hidden)]
pub use serde as __serde;

#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All values, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err($crate::DomainError::validation(format!(
                        "unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }

        impl $crate::enumeration::__serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: $crate::enumeration::__serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> $crate::enumeration::__serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: $crate::enumeration::__serde::Deserializer<'de>,
            {
                let raw = <String as $crate::enumeration::__serde::Deserialize>::deserialize(deserializer)?;
                raw.parse()
                    .map_err(<D::Error as $crate::enumeration::__serde::de::Error>::custom)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::DomainError;

    wire_enum! {
        enum Colour: "colour" {
            Red => "ROJO",
            Blue => "AZUL",
        }
    }

    #[test]
    fn parses_known_spellings() {
        assert_eq!("ROJO".parse::<Colour>().unwrap(), Colour::Red);
        assert_eq!(Colour::Blue.to_string(), "AZUL");
        assert_eq!(Colour::ALL.len(), 2);
    }

    #[test]
    fn unknown_spelling_is_rejected() {
        let err = "rojo".parse::<Colour>().unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("unknown colour 'rojo'") => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn serde_uses_wire_spelling() {
        assert_eq!(serde_json::to_string(&Colour::Red).unwrap(), "\"ROJO\"");
        assert_eq!(serde_json::from_str::<Colour>("\"AZUL\"").unwrap(), Colour::Blue);
        assert!(serde_json::from_str::<Colour>("\"VERDE\"").is_err());
    }
}
