use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const MIN_STARS: i64 = 1;
pub const MAX_STARS: i64 = 5;

fn invalid() -> AppError {
    AppError::validation("Invalid rating value.")
}

/// Accepts a whole number in `[1, 5]`, given as a JSON number or a numeric string.
pub fn parse_stars(raw: Option<&Value>) -> AppResult<i16> {
    let value = match raw {
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 => f as i64,
            _ => return Err(invalid()),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => match s.parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
                    _ => return Err(invalid()),
                },
            }
        }
        _ => return Err(invalid()),
    };
    if !(MIN_STARS..=MAX_STARS).contains(&value) {
        return Err(invalid());
    }
    Ok(value as i16)
}
