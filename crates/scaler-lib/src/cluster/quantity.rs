//! Parsing of Kubernetes resource quantities
//!
//! `k8s_openapi` carries quantities as opaque strings ("500m", "16Gi",
//! "128974848", "1e3"). The scaler needs them as plain integers: CPU in
//! millicores, memory and storage in bytes.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("unparsable quantity {0:?}")]
    BadNumber(String),

    #[error("unknown quantity suffix {0:?}")]
    UnknownSuffix(String),
}

/// Interpret a quantity as CPU millicores ("500m" -> 500, "2" -> 2000)
pub fn parse_millicores(quantity: &Quantity) -> Result<i64, QuantityError> {
    let value = parse_value(&quantity.0)?;
    Ok((value * 1000.0).round() as i64)
}

/// Interpret a quantity as a byte count ("1Ki" -> 1024, "128974848" -> itself)
pub fn parse_bytes(quantity: &Quantity) -> Result<i64, QuantityError> {
    let value = parse_value(&quantity.0)?;
    Ok(value.round() as i64)
}

fn parse_value(raw: &str) -> Result<f64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    let (number, suffix) = split_suffix(raw);
    let base: f64 = number
        .parse()
        .map_err(|_| QuantityError::BadNumber(raw.to_string()))?;

    let multiplier = match suffix {
        "" => 1.0,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Ei" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => return Err(QuantityError::UnknownSuffix(other.to_string())),
    };

    Ok(base * multiplier)
}

/// Split a quantity into its numeric part and unit suffix
///
/// An `e`/`E` followed by a signed integer is a decimal exponent and stays
/// with the number ("1e3"); a bare trailing `E` is the exa suffix.
fn split_suffix(raw: &str) -> (&str, &str) {
    let split_at = raw
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '+' || *c == '-'));

    match split_at {
        None => (raw, ""),
        Some((idx, c)) => {
            if c == 'e' || c == 'E' {
                let exponent = &raw[idx + 1..];
                if !exponent.is_empty()
                    && exponent
                        .chars()
                        .all(|c| c.is_ascii_digit() || c == '+' || c == '-')
                {
                    return (raw, "");
                }
            }
            raw.split_at(idx)
        }
    }
}
