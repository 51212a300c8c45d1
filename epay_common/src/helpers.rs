/// Reads an on/off switch such as `EPAY_MERCHANT_CARD_SAVE`. Anything unrecognised leaves the default in place.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    value
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Parse a number of seconds from an environment value, falling back to the default when the value is missing or
/// malformed.
pub fn parse_seconds(value: Option<String>, default: u64) -> u64 {
    value.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default)
}
