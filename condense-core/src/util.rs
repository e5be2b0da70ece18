//! Small helpers shared by the pipeline stages.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Boolean value expected, got '{0}'")]
pub struct ParseBoolError(pub String);

/// Parse a yes/no style token.
///
/// Accepts `yes true t y 1` and `no false f n 0`, ignoring case.
pub fn parse_bool(token: &str) -> Result<bool, ParseBoolError> {
    match token.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err(ParseBoolError(token.to_string())),
    }
}
