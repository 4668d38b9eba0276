//! JSON post-processing applied to uploads declared as `application/json`.
//!
//! Two edits are applied to every level of the document:
//! - object keys whose first character (lower-cased) is a vowel are removed
//! - numbers that are exact even integers are multiplied by 1000
//!
//! Numbers are decoded with `arbitrary_precision`, so integer-ness and
//! parity are decided on the literal decimal text and large values never
//! pass through `f64`.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Exponents that would append more than this many zeros are left as written.
const MAX_EXPONENT_ZEROS: usize = 4096;
const SCALE_SUFFIX: &str = "000";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("payload is not valid JSON: {0}")]
    InvalidInput(#[source] serde_json::Error),
    #[error("failed to re-encode number `{text}`: {source}")]
    Number {
        text: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize transformed JSON: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Parse, rewrite and re-serialize a JSON document.
pub fn transform(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut value: Value = serde_json::from_slice(input).map_err(TransformError::InvalidInput)?;
    rewrite(&mut value)?;
    serde_json::to_vec(&value).map_err(TransformError::Serialize)
}

/// Apply both edits to `value` in place, depth first.
pub fn rewrite(value: &mut Value) -> Result<(), TransformError> {
    match value {
        Value::Object(map) => rewrite_object(map)?,
        Value::Array(items) => {
            for item in items.iter_mut() {
                rewrite(item)?;
            }
        }
        Value::Number(number) => {
            if let Some(replacement) = rewrite_number(number)? {
                *number = replacement;
            }
        }
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
    Ok(())
}

fn rewrite_object(map: &mut Map<String, Value>) -> Result<(), TransformError> {
    // Every value is visited before any key is dropped, including the
    // values of keys that are about to go.
    for child in map.values_mut() {
        rewrite(child)?;
    }
    map.retain(|key, _| !starts_with_vowel(key));
    Ok(())
}

/// First character, lower-cased, is one of `a e i o u`.
pub fn starts_with_vowel(key: &str) -> bool {
    key.chars()
        .next()
        .and_then(|c| c.to_lowercase().next())
        .is_some_and(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
}

/// `Some(new)` when the number is an exact integer, either scaled (even)
/// or normalized to plain integer text (odd). `None` leaves it untouched.
fn rewrite_number(number: &Number) -> Result<Option<Number>, TransformError> {
    let text = number.to_string();
    let Some(integer) = ExactInteger::parse(&text) else {
        return Ok(None);
    };

    let rendered = if integer.is_even() {
        integer.scaled().render()
    } else {
        integer.render()
    };
    if rendered == text {
        return Ok(None);
    }

    serde_json::from_str::<Number>(&rendered)
        .map(Some)
        .map_err(|source| TransformError::Number {
            text: rendered,
            source,
        })
}

/// An integer held as its canonical decimal digits.
#[derive(Debug, PartialEq, Eq)]
struct ExactInteger {
    negative: bool,
    /// No leading zeros; `"0"` for zero.
    digits: String,
}

impl ExactInteger {
    /// Interpret a JSON number literal. `None` for non-integers and for
    /// exponents too large to expand.
    fn parse(text: &str) -> Option<Self> {
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => (&unsigned[..pos], unsigned[pos + 1..].parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (mantissa, ""),
        };
        if int_part.is_empty() || !mantissa.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }

        let all_digits = format!("{int_part}{frac_part}");
        let significant = all_digits.trim_start_matches('0');
        if significant.is_empty() {
            return Some(Self::zero());
        }

        let shift = exponent.checked_sub(i64::try_from(frac_part.len()).ok()?)?;
        let digits = if shift >= 0 {
            let zeros = usize::try_from(shift).ok()?;
            if zeros > MAX_EXPONENT_ZEROS {
                return None;
            }
            format!("{significant}{}", "0".repeat(zeros))
        } else {
            let dropped = usize::try_from(shift.unsigned_abs()).ok()?;
            let trailing_zeros = significant.len() - significant.trim_end_matches('0').len();
            if trailing_zeros < dropped {
                return None;
            }
            significant[..significant.len() - dropped].to_string()
        };

        Some(Self { negative, digits })
    }

    fn zero() -> Self {
        Self {
            negative: false,
            digits: "0".into(),
        }
    }

    fn is_zero(&self) -> bool {
        self.digits == "0"
    }

    fn is_even(&self) -> bool {
        self.digits
            .bytes()
            .last()
            .is_some_and(|d| (d - b'0') % 2 == 0)
    }

    fn scaled(self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        Self {
            negative: self.negative,
            digits: format!("{}{SCALE_SUFFIX}", self.digits),
        }
    }

    fn render(&self) -> String {
        if self.negative && !self.is_zero() {
            format!("-{}", self.digits)
        } else {
            self.digits.clone()
        }
    }
}
