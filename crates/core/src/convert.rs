//! String-to-value conversion for parameter targets.

use std::fmt::Display;

/// Types that can be produced from a single textual argument.
///
/// Implemented for `String`, `bool`, all signed and unsigned integer widths
/// including the native ones, and both float widths. `Display` and `Default`
/// are supertraits so that untouched default values can be rendered back and
/// re-validated against custom scanners during the verification pass.
pub trait FromArg: Clone + Default + Display + 'static {
    /// Convert `value`, reporting a human-readable reason on failure.
    fn from_arg(value: &str) -> Result<Self, String>;
}

impl FromArg for String {
    fn from_arg(value: &str) -> Result<Self, String> {
        Ok(value.to_string())
    }
}

impl FromArg for bool {
    fn from_arg(value: &str) -> Result<Self, String> {
        if value == "1" || value.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if value == "0" || value.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!(r#"cannot convert "{value}" to bool"#))
        }
    }
}

/// Split an integer literal into a radix and the text to parse, honoring an
/// optional sign and the `0x`/`0o`/leading-zero prefixes.
fn int_parts(value: &str) -> (u32, String) {
    let (sign, rest) = match value.as_bytes().first() {
        Some(b'-') => ("-", &value[1..]),
        Some(b'+') => ("", &value[1..]),
        _ => ("", value),
    };
    let (radix, digits) = if let Some(d) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, d)
    } else if let Some(d) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, d)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };
    (radix, format!("{sign}{digits}"))
}

macro_rules! from_arg_int {
    ($($ty:ty),* $(,)?) => {$(
        impl FromArg for $ty {
            fn from_arg(value: &str) -> Result<Self, String> {
                let (radix, digits) = int_parts(value);
                <$ty>::from_str_radix(&digits, radix).map_err(|e| {
                    format!(r#"cannot convert "{}" to {}: {}"#, value, stringify!($ty), e)
                })
            }
        }
    )*};
}

from_arg_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! from_arg_float {
    ($($ty:ty),* $(,)?) => {$(
        impl FromArg for $ty {
            fn from_arg(value: &str) -> Result<Self, String> {
                value.parse::<$ty>().map_err(|e| {
                    format!(r#"cannot convert "{}" to {}: {}"#, value, stringify!($ty), e)
                })
            }
        }
    )*};
}

from_arg_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string() {
        assert_eq!(String::from_arg("hello world").unwrap(), "hello world");
        assert_eq!(String::from_arg("").unwrap(), "");
    }

    #[test]
    fn test_bool_forms() {
        assert!(bool::from_arg("true").unwrap());
        assert!(bool::from_arg("TRUE").unwrap());
        assert!(bool::from_arg("True").unwrap());
        assert!(bool::from_arg("1").unwrap());
        assert!(!bool::from_arg("false").unwrap());
        assert!(!bool::from_arg("FALSE").unwrap());
        assert!(!bool::from_arg("0").unwrap());
        assert!(bool::from_arg("yes").is_err());
        assert!(bool::from_arg("2").is_err());
    }

    #[test]
    fn test_int_base_auto() {
        assert_eq!(i64::from_arg("42").unwrap(), 42);
        assert_eq!(i64::from_arg("-42").unwrap(), -42);
        assert_eq!(i64::from_arg("+42").unwrap(), 42);
        assert_eq!(i64::from_arg("0x1f").unwrap(), 31);
        assert_eq!(i64::from_arg("0X1F").unwrap(), 31);
        assert_eq!(i64::from_arg("-0x10").unwrap(), -16);
        assert_eq!(i64::from_arg("0o17").unwrap(), 15);
        assert_eq!(i64::from_arg("017").unwrap(), 15);
        assert_eq!(i64::from_arg("0").unwrap(), 0);
    }

    #[test]
    fn test_int_range() {
        assert_eq!(u8::from_arg("255").unwrap(), 255);
        assert!(u8::from_arg("256").is_err());
        assert!(u8::from_arg("-1").is_err());
        assert_eq!(i8::from_arg("-128").unwrap(), -128);
        assert!(i8::from_arg("128").is_err());
        assert!(u16::from_arg("0x10000").is_err());
    }

    #[test]
    fn test_int_garbage() {
        assert!(i32::from_arg("").is_err());
        assert!(i32::from_arg("0x").is_err());
        assert!(i32::from_arg("12.5").is_err());
        assert!(i32::from_arg("abc").is_err());
        let err = i32::from_arg("abc").unwrap_err();
        assert!(err.contains(r#""abc""#), "offending value in message: {err}");
    }

    #[test]
    fn test_float() {
        assert_eq!(f64::from_arg("1.5").unwrap(), 1.5);
        assert_eq!(f32::from_arg("-2.25").unwrap(), -2.25);
        assert_eq!(f64::from_arg("1e3").unwrap(), 1000.0);
        assert!(f64::from_arg("one").is_err());
    }
}
