use crate::exit::{CliError, CliResult, USAGE};

/// Parse hex bytes, ignoring whitespace, `:` separators and a leading `0x`.
pub fn parse(text: &str) -> CliResult<Vec<u8>> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("odd number of hex digits ({})", digits.len()),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| -> CliResult<u8> { Ok((nibble(pair[0])? << 4) | nibble(pair[1])?) })
        .collect()
}

pub fn format(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn nibble(digit: u8) -> CliResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(CliError::new(
            USAGE,
            format!("invalid hex digit '{}'", char::from(digit)),
        )),
    }
}
