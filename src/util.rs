//! Small helpers shared across modules.

/// Parse a command argument as a signed integer, mapping failure to the
/// standard Redis error message.
pub fn parse_int(buf: &[u8]) -> Result<i64, crate::error::RedisError> {
    std::str::from_utf8(buf)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(crate::error::RedisError::NotAnInteger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_rejects_non_numeric_input() {
        assert!(parse_int(b"not a number").is_err());
        assert_eq!(parse_int(b"42").unwrap(), 42);
        assert_eq!(parse_int(b"-7").unwrap(), -7);
    }
}
