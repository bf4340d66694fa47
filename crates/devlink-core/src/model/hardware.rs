// ── Radio hardware address ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address `{0}`: expected six hex octets")]
pub struct ParseHardwareAddressError(String);

/// Station-interface MAC address of the radio.
///
/// Displayed in lowercase colon-separated form (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Last three octets as uppercase hex, e.g. `A1B2C3`.
    pub fn suffix_hex(&self) -> String {
        let [.., d, e, f] = self.0;
        format!("{d:02X}{e:02X}{f:02X}")
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareAddress {
    type Err = ParseHardwareAddressError;

    /// Accepts colon-separated, dash-separated, or bare hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseHardwareAddressError(s.to_owned());
        let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (slot, pair) in octets.iter_mut().zip(hex.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for HardwareAddress {
    type Error = ParseHardwareAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HardwareAddress> for String {
    fn from(addr: HardwareAddress) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_last_three_octets_uppercase() {
        let addr = HardwareAddress::new([0x24, 0x6f, 0x28, 0xa1, 0xb2, 0xc3]);
        assert_eq!(addr.suffix_hex(), "A1B2C3");
    }

    #[test]
    fn parses_common_formats() {
        let expected = HardwareAddress::new([0x24, 0x6f, 0x28, 0xa1, 0xb2, 0xc3]);
        assert_eq!("24:6F:28:A1:B2:C3".parse::<HardwareAddress>().unwrap(), expected);
        assert_eq!("24-6f-28-a1-b2-c3".parse::<HardwareAddress>().unwrap(), expected);
        assert_eq!("246f28a1b2c3".parse::<HardwareAddress>().unwrap(), expected);
    }

    #[test]
    fn rejects_short_or_non_hex_input() {
        assert!("24:6f:28".parse::<HardwareAddress>().is_err());
        assert!("zz:6f:28:a1:b2:c3".parse::<HardwareAddress>().is_err());
        assert!("24:6f:28:a1:b2:c3:00".parse::<HardwareAddress>().is_err());
    }

    #[test]
    fn displays_lowercase_colon_form() {
        let addr: HardwareAddress = "246F28A1B2C3".parse().unwrap();
        assert_eq!(addr.to_string(), "24:6f:28:a1:b2:c3");
    }
}
