//! Parser for the `"10G"`-style storage-size strings used in the config file.
//!
//! Grammar: one or more ASCII digits, followed by an optional single-letter
//! suffix (`K`, `M`, `G`, `T`, case-insensitive) using SI-binary (1024-based)
//! multipliers. No suffix means bytes. Anything else — empty input, a sign,
//! a decimal point, trailing garbage after the suffix — is a parse error.

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Parse a size string such as `"512"`, `"10G"`, `"1T"` into a byte count.
///
/// Returns `None` on any malformed input, including trailing garbage after
/// the suffix. Callers that must keep a prior value on failure (the config
/// loader) should treat `None` that way explicitly; this function never
/// silently substitutes a value.
pub fn parse_size(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (digits, multiplier) = match input.as_bytes().last()? {
        b'K' | b'k' => (&input[..input.len() - 1], KIB),
        b'M' | b'm' => (&input[..input.len() - 1], MIB),
        b'G' | b'g' => (&input[..input.len() - 1], GIB),
        b'T' | b't' => (&input[..input.len() - 1], TIB),
        b'0'..=b'9' => (input, 1),
        _ => return None,
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let value: u64 = digits.parse().ok()?;
    value.checked_mul(multiplier)
}

/// Render a byte count back into the shortest exact `parse_size`-compatible
/// string (used by diagnostics/CLI output, not by the on-disk config which
/// always stores the numeric form it was given).
pub fn format_size(bytes: u64) -> String {
    if bytes != 0 && bytes % TIB == 0 {
        format!("{}T", bytes / TIB)
    } else if bytes != 0 && bytes % GIB == 0 {
        format!("{}G", bytes / GIB)
    } else if bytes != 0 && bytes % MIB == 0 {
        format!("{}M", bytes / MIB)
    } else if bytes != 0 && bytes % KIB == 0 {
        format!("{}K", bytes / KIB)
    } else {
        bytes.to_string()
    }
}
