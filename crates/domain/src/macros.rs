//! Macro for implementing Display and FromStr for unit enums
//!
//! Status-like enums (rollback modes, run kinds, property kinds) need the
//! same lowercase `Display` and case-insensitive `FromStr` pair so they can
//! round-trip through CLI flags and report files.
//!
//! # Example
//!
//! ```rust
//! use portalsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum SyncDirection {
//!     Push,
//!     Pull,
//! }
//!
//! impl_domain_status_conversions!(SyncDirection {
//!     Push => "push",
//!     Pull => "pull",
//! });
//!
//! assert_eq!(SyncDirection::VARIANTS, &["push", "pull"]);
//! ```

/// Implements Display and FromStr for a unit enum, plus a `VARIANTS` list of
/// its accepted spellings.
///
/// Parsing trims and lowercases the input; a rejected value is reported
/// together with the accepted ones.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Accepted string forms, in declaration order.
            pub const VARIANTS: &'static [&'static str] = &[$($str),+];
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "Invalid {}: {} (expected one of: {})",
                        stringify!($enum_name),
                        s,
                        Self::VARIANTS.join(", ")
                    )),
                }
            }
        }
    };
}
