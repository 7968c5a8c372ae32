use crate::error::{Result, ScrapeError};

/// Token encoder of the packer.
///
/// Digits `0..=35` use the base-36 alphabet (`0-9a-z`); digits above 35 are
/// shifted by 29 code points, giving `A-Z` for 36..=61. This differs from any
/// standard base-62 alphabet and has to be reproduced as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    radix: u32,
}

impl Encoder {
    pub fn new(radix: u32) -> Result<Self> {
        if radix < 2 {
            return Err(ScrapeError::deobfuscation(format!(
                "unsupported radix {radix}"
            )));
        }
        Ok(Self { radix })
    }

    pub fn encode(&self, n: u64) -> String {
        let radix = u64::from(self.radix);
        let mut encoded = if n < radix {
            String::new()
        } else {
            self.encode(n / radix)
        };
        encoded.push(digit_char(n % radix));
        encoded
    }
}

fn digit_char(digit: u64) -> char {
    if digit > 35 {
        u32::try_from(digit + 29)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    } else {
        // digit <= 35 always has a base-36 representation
        char::from_digit(digit as u32, 36).unwrap_or('0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_radix() {
        assert!(Encoder::new(0).is_err());
        assert!(Encoder::new(1).is_err());
        assert!(Encoder::new(2).is_ok());
    }

    #[test]
    fn test_alphabet_extension() {
        let encoder = Encoder::new(62).unwrap();
        assert_eq!(encoder.encode(0), "0");
        assert_eq!(encoder.encode(9), "9");
        assert_eq!(encoder.encode(10), "a");
        assert_eq!(encoder.encode(35), "z");
        assert_eq!(encoder.encode(36), "A");
        assert_eq!(encoder.encode(61), "Z");
        assert_eq!(encoder.encode(62), "10");
        assert_eq!(encoder.encode(62 * 10 + 11), "ab");
        assert_eq!(encoder.encode(62 * 62), "100");
    }

    #[test]
    fn test_small_radix() {
        let encoder = Encoder::new(2).unwrap();
        assert_eq!(encoder.encode(5), "101");
        let encoder = Encoder::new(36).unwrap();
        assert_eq!(encoder.encode(36 * 35 + 35), "zz");
    }

    #[test]
    fn test_length_is_monotonic() {
        for radix in 2..=62u32 {
            let encoder = Encoder::new(radix).unwrap();
            let limit = u64::from(radix).pow(3);
            let mut previous = 0;
            for n in 0..limit {
                let len = encoder.encode(n).len();
                assert!(
                    len >= previous,
                    "length decreased at n={n} radix={radix}"
                );
                previous = len;
            }
        }
    }
}
