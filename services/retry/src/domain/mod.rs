/// Error returned when a stored or submitted enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `FromStr` and `Display` over a fixed set of
/// SCREAMING_CASE labels, which is also how the variants are persisted.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err($crate::domain::UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Declared after the macro so every domain module sees it in textual scope.
pub mod attempt;
pub mod audit;
pub mod calendar;
pub mod eligibility;
pub mod job;
pub mod policy;
pub mod port;
pub mod reminder;
pub mod repository;
pub mod schedule;
