use std::fmt;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// A byte count that displays with base-1024 units, e.g. `7.63 MB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes < 1024 {
            return write!(f, "{} B", bytes);
        }
        // Every unit step is 10 bits.
        let exponent = ((63 - bytes.leading_zeros()) / 10).min(UNITS.len() as u32 - 1);
        let value = bytes as f64 / (1u64 << (10 * exponent)) as f64;
        write!(f, "{:.2} {}", value, UNITS[exponent as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ByteSize(0).to_string(), "0 B");
        assert_eq!(ByteSize(1023).to_string(), "1023 B");
        assert_eq!(ByteSize(1024).to_string(), "1.00 KB");
        assert_eq!(ByteSize(8_000_000).to_string(), "7.63 MB");
        assert_eq!(ByteSize(131_072 * 1024 * 1024).to_string(), "128.00 GB");
    }

    #[test]
    fn test_largest_unit_caps_at_petabytes() {
        assert_eq!(ByteSize(u64::MAX).to_string(), "16384.00 PB");
    }
}
