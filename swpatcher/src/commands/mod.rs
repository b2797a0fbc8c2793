//! Command implementations

pub mod archive;
pub mod patch;
pub mod res;

/// Parse an obfuscation key given as decimal or `0x`-prefixed hex
pub fn parse_key(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid key '{value}': {e}"))
}
