//! Macros for reducing boilerplate code

/// Implements `Display` and `FromStr` for unit-variant enums
///
/// `Display` writes the mapped lowercase name; `FromStr` parses it
/// case-insensitively, also accepting `-` in place of `_`.
///
/// ```rust,ignore
/// use holdfast_common::impl_kind_conversions;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Shape {
///     Constant,
///     TimeSeries,
/// }
///
/// impl_kind_conversions!(Shape {
///     Constant => "constant",
///     TimeSeries => "time_series",
/// });
///
/// assert_eq!(Shape::TimeSeries.to_string(), "time_series");
/// assert_eq!("Time-Series".parse::<Shape>(), Ok(Shape::TimeSeries));
/// ```
#[macro_export]
macro_rules! impl_kind_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
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
                match s.trim().to_lowercase().replace('-', "_").as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
