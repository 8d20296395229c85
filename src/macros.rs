/// Generates a non-exhaustive enum mapping Rust variants to wire field names.
///
/// Produces: enum definition + `as_str()` + `Display` + `AsRef<str>` +
/// `From<_> for String` + `FromStr` (case-insensitive, matching how AMI
/// compares field names). The error type must be defined separately next to
/// the enum.
///
/// # Example
///
/// ```ignore
/// define_field_enum! {
///     error_type: ParseMyFieldError,
///     /// Doc comment for the enum.
///     pub enum MyField {
///         Foo => "Foo",
///         BarBaz => "Bar-Baz",
///     }
/// }
/// ```
macro_rules! define_field_enum {
    (
        error_type: $Err:ident,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Canonical wire spelling of the field name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl From<$Name> for String {
            fn from(name: $Name) -> String {
                name.as_str().to_string()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($wire) {
                        return Ok($Name::$variant);
                    }
                )+
                Err($Err(s.to_string()))
            }
        }
    };
}
