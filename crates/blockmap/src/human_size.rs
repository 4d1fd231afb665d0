//! Human-readable byte counts for log output.

use core::fmt;

/// Wraps a size in bytes and formats it with binary prefixes (KiB, MiB, ...).
///
/// Values below 1KiB are printed exactly. Larger values are printed with at most one decimal
/// place, truncated rather than rounded, and the decimal is dropped when it would be zero.
///
/// ```
/// use blockmap::HumanSize;
///
/// assert_eq!(format!("{}", HumanSize(648)), "648B");
/// assert_eq!(format!("{}", HumanSize(1536)), "1.5KiB");
/// assert_eq!(format!("{}", HumanSize(4 * 1024 * 1024)), "4MiB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HumanSize(pub usize);

impl HumanSize {
    /// Returns the raw byte count.
    #[inline]
    pub const fn bytes(self) -> usize {
        self.0
    }
}

impl From<usize> for HumanSize {
    #[inline]
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

        let mut whole = self.0;
        let mut remainder = 0;
        let mut unit = 0;
        while whole >= 1024 && unit < UNITS.len() - 1 {
            remainder = whole % 1024;
            whole /= 1024;
            unit += 1;
        }

        let tenths = remainder * 10 / 1024;
        if tenths == 0 {
            write!(f, "{}{}", whole, UNITS[unit])
        } else {
            write!(f, "{}.{}{}", whole, tenths, UNITS[unit])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes() {
        assert_eq!(format!("{}", HumanSize(0)), "0B");
        assert_eq!(format!("{}", HumanSize(1023)), "1023B");
    }

    #[test]
    fn formats_binary_units() {
        assert_eq!(format!("{}", HumanSize(1024)), "1KiB");
        assert_eq!(format!("{}", HumanSize(1536)), "1.5KiB");
        assert_eq!(format!("{}", HumanSize(1572864)), "1.5MiB");
        assert_eq!(format!("{}", HumanSize(1073741824)), "1GiB");
    }

    #[test]
    fn truncates_to_one_decimal() {
        // 1.0009765625 KiB
        assert_eq!(format!("{}", HumanSize(1025)), "1KiB");
        // 1.99 KiB
        assert_eq!(format!("{}", HumanSize(2038)), "1.9KiB");
    }
}
