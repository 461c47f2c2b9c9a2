//! Value codecs for text-protocol registers.
//!
//! GPIB-class instruments exchange values as text, while the memory
//! framework deals in raw little-endian register bytes. A [`ValueCodec`]
//! bridges the two for one register: `format` renders the register bytes as
//! the textual value sent on the wire, `parse` turns a response string back
//! into exactly `byte_size` register bytes.
//!
//! Codecs are registered per address at configuration time and shared
//! immutably with the bridge worker, so implementations must be `Send + Sync`.

use crate::error::{BridgeError, Result};

/// Number of bytes needed to hold `bits` bits.
pub fn byte_count(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Conversion strategy between register bytes and wire text for one register.
pub trait ValueCodec: Send + Sync {
    /// Declared width of the register in bits.
    fn bit_size(&self) -> usize;

    /// Declared width of the register in bytes.
    fn byte_size(&self) -> usize {
        byte_count(self.bit_size())
    }

    /// Render register bytes (little-endian, `byte_size` long) as the value
    /// text placed on the wire.
    fn format(&self, bytes: &[u8]) -> Result<String>;

    /// Parse a response value back into `byte_size` register bytes.
    fn parse(&self, text: &str) -> Result<Vec<u8>>;
}

fn codec_err(msg: impl Into<String>) -> BridgeError {
    BridgeError::Codec(msg.into())
}

/// Assemble up to 8 little-endian bytes into a u64.
fn u64_from_le(bytes: &[u8], width: usize) -> Result<u64> {
    if bytes.len() != width {
        return Err(codec_err(format!(
            "expected {width} register bytes, got {}",
            bytes.len()
        )));
    }
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Parse decimal or `0x`-prefixed hex text as u64.
fn u64_from_text(text: &str) -> Result<u64> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| codec_err(format!("invalid unsigned value {text:?}: {e}")))
}

/// Unsigned integer register up to 64 bits, little-endian bytes, decimal text.
pub struct UIntCodec {
    bits: usize,
}

impl UIntCodec {
    /// A codec for an unsigned register of `bits` width (1..=64).
    pub fn new(bits: usize) -> Self {
        debug_assert!((1..=64).contains(&bits));
        UIntCodec { bits }
    }

    fn mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

impl ValueCodec for UIntCodec {
    fn bit_size(&self) -> usize {
        self.bits
    }

    fn format(&self, bytes: &[u8]) -> Result<String> {
        let value = u64_from_le(bytes, self.byte_size())? & self.mask();
        Ok(value.to_string())
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>> {
        let value = u64_from_text(text)? & self.mask();
        Ok(value.to_le_bytes()[..self.byte_size()].to_vec())
    }
}

/// Signed integer register up to 64 bits, two's complement little-endian
/// bytes, decimal text.
pub struct IntCodec {
    bits: usize,
}

impl IntCodec {
    /// A codec for a signed register of `bits` width (2..=64).
    pub fn new(bits: usize) -> Self {
        debug_assert!((2..=64).contains(&bits));
        IntCodec { bits }
    }
}

impl ValueCodec for IntCodec {
    fn bit_size(&self) -> usize {
        self.bits
    }

    fn format(&self, bytes: &[u8]) -> Result<String> {
        let raw = u64_from_le(bytes, self.byte_size())?;
        // Sign-extend from the declared bit width.
        let shift = 64 - self.bits;
        let value = ((raw << shift) as i64) >> shift;
        Ok(value.to_string())
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>> {
        let value = text
            .trim()
            .parse::<i64>()
            .map_err(|e| codec_err(format!("invalid signed value {text:?}: {e}")))?;
        if self.bits < 64 {
            let min = -(1i64 << (self.bits - 1));
            let max = (1i64 << (self.bits - 1)) - 1;
            if value < min || value > max {
                return Err(codec_err(format!(
                    "value {value} out of range for {}-bit register",
                    self.bits
                )));
            }
        }
        Ok(value.to_le_bytes()[..self.byte_size()].to_vec())
    }
}

/// IEEE-754 float register, 32 or 64 bits, little-endian bytes, decimal text.
pub struct FloatCodec {
    bits: usize,
}

impl FloatCodec {
    /// A 32-bit float codec.
    pub fn single() -> Self {
        FloatCodec { bits: 32 }
    }

    /// A 64-bit float codec.
    pub fn double() -> Self {
        FloatCodec { bits: 64 }
    }
}

impl ValueCodec for FloatCodec {
    fn bit_size(&self) -> usize {
        self.bits
    }

    fn format(&self, bytes: &[u8]) -> Result<String> {
        match self.bits {
            32 => {
                let mut buf = [0u8; 4];
                if bytes.len() != 4 {
                    return Err(codec_err(format!("expected 4 bytes, got {}", bytes.len())));
                }
                buf.copy_from_slice(bytes);
                Ok(f32::from_le_bytes(buf).to_string())
            }
            _ => {
                let mut buf = [0u8; 8];
                if bytes.len() != 8 {
                    return Err(codec_err(format!("expected 8 bytes, got {}", bytes.len())));
                }
                buf.copy_from_slice(bytes);
                Ok(f64::from_le_bytes(buf).to_string())
            }
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>> {
        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|e| codec_err(format!("invalid float value {text:?}: {e}")))?;
        match self.bits {
            32 => Ok((value as f32).to_le_bytes().to_vec()),
            _ => Ok(value.to_le_bytes().to_vec()),
        }
    }
}

/// Boolean register, one byte, `0`/`1` text (accepts `true`/`false` too).
pub struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn bit_size(&self) -> usize {
        1
    }

    fn format(&self, bytes: &[u8]) -> Result<String> {
        match bytes {
            [b] => Ok(if *b != 0 { "1" } else { "0" }.to_string()),
            _ => Err(codec_err(format!("expected 1 byte, got {}", bytes.len()))),
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>> {
        match text.trim() {
            "1" | "true" | "TRUE" | "True" | "ON" => Ok(vec![1]),
            "0" | "false" | "FALSE" | "False" | "OFF" => Ok(vec![0]),
            other => Err(codec_err(format!("invalid bool value {other:?}"))),
        }
    }
}

/// Fixed-width ASCII register: bytes pass through as text, padded with NUL
/// on parse. Used for instruments whose registers hold raw serial strings.
pub struct AsciiCodec {
    size: usize,
}

impl AsciiCodec {
    /// A codec for a `size`-byte text register.
    pub fn new(size: usize) -> Self {
        debug_assert!(size >= 1);
        AsciiCodec { size }
    }
}

impl ValueCodec for AsciiCodec {
    fn bit_size(&self) -> usize {
        self.size * 8
    }

    fn format(&self, bytes: &[u8]) -> Result<String> {
        if bytes.len() != self.size {
            return Err(codec_err(format!(
                "expected {} bytes, got {}",
                self.size,
                bytes.len()
            )));
        }
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        String::from_utf8(bytes[..end].to_vec())
            .map_err(|e| codec_err(format!("register bytes are not UTF-8: {e}")))
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>> {
        let raw = text.as_bytes();
        if raw.len() > self.size {
            return Err(codec_err(format!(
                "value {text:?} longer than {}-byte register",
                self.size
            )));
        }
        let mut bytes = raw.to_vec();
        bytes.resize(self.size, 0);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_count_rounds_up() {
        assert_eq!(byte_count(1), 1);
        assert_eq!(byte_count(8), 1);
        assert_eq!(byte_count(9), 2);
        assert_eq!(byte_count(32), 4);
        assert_eq!(byte_count(33), 5);
    }

    #[test]
    fn uint_format_is_decimal() {
        let codec = UIntCodec::new(32);
        assert_eq!(codec.byte_size(), 4);
        assert_eq!(codec.format(&[0xe8, 0x03, 0, 0]).unwrap(), "1000");
    }

    #[test]
    fn uint_parse_accepts_decimal_and_hex() {
        let codec = UIntCodec::new(32);
        assert_eq!(codec.parse("42").unwrap(), vec![42, 0, 0, 0]);
        assert_eq!(codec.parse("0x2a").unwrap(), vec![0x2a, 0, 0, 0]);
        assert!(codec.parse("forty-two").is_err());
    }

    #[test]
    fn uint_narrow_width_masks() {
        let codec = UIntCodec::new(12);
        assert_eq!(codec.byte_size(), 2);
        // 0x1fff masked to 12 bits is 0xfff
        assert_eq!(codec.parse("8191").unwrap(), vec![0xff, 0x0f]);
    }

    #[test]
    fn int_sign_extends() {
        let codec = IntCodec::new(16);
        assert_eq!(codec.format(&[0xff, 0xff]).unwrap(), "-1");
        assert_eq!(codec.parse("-2").unwrap(), vec![0xfe, 0xff]);
    }

    #[test]
    fn int_rejects_values_outside_declared_width() {
        let codec = IntCodec::new(16);
        assert_eq!(codec.parse("32767").unwrap(), vec![0xff, 0x7f]);
        assert_eq!(codec.parse("-32768").unwrap(), vec![0x00, 0x80]);
        assert!(codec.parse("32768").is_err());
        assert!(codec.parse("70000").is_err());
        assert!(codec.parse("-32769").is_err());
    }

    #[test]
    fn float_round_trips_text() {
        let codec = FloatCodec::single();
        let bytes = codec.parse("2.5").unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(codec.format(&bytes).unwrap(), "2.5");
    }

    #[test]
    fn bool_accepts_common_spellings() {
        let codec = BoolCodec;
        assert_eq!(codec.parse("1").unwrap(), vec![1]);
        assert_eq!(codec.parse("false").unwrap(), vec![0]);
        assert_eq!(codec.format(&[1]).unwrap(), "1");
        assert!(codec.parse("maybe").is_err());
    }

    #[test]
    fn ascii_pads_and_strips_nul() {
        let codec = AsciiCodec::new(8);
        assert_eq!(codec.parse("IDN").unwrap(), b"IDN\0\0\0\0\0".to_vec());
        assert_eq!(codec.format(b"IDN\0\0\0\0\0").unwrap(), "IDN");
        assert!(codec.parse("way too long text").is_err());
    }
}
