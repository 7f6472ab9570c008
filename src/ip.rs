//! IP text parsing and the IPv6-transition-to-IPv4 folding rules.

use std::net::IpAddr;
use std::str::FromStr;

/// Marker error for "the text is not a valid IPv4 or IPv6 address".
///
/// Kept separate from [`crate::Error`]: an invalid address is reported
/// through the sentinel-string record channel, not as a `Result::Err` a
/// caller could `?`-propagate past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress;

/// `::ffff:0:0` through `::ffff:ffff:ffff`, i.e. `0x0000_…_ffff_00000000` to
/// `0x0000_…_ffff_ffffffff` — IPv4-mapped IPv6 addresses.
const FROM_V4_MAPPED: u128 = 0x0000_0000_0000_0000_0000_ffff_0000_0000;
const TO_V4_MAPPED: u128 = 0x0000_0000_0000_0000_0000_ffff_ffff_ffff;

/// `2002::/16` — 6to4.
const FROM_6TO4: u128 = 0x2002_0000_0000_0000_0000_0000_0000_0000;
const TO_6TO4: u128 = 0x2002_ffff_ffff_ffff_ffff_ffff_ffff_ffff;

/// `2001:0000::/32` — Teredo.
const FROM_TEREDO: u128 = 0x2001_0000_0000_0000_0000_0000_0000_0000;
const TO_TEREDO: u128 = 0x2001_0000_ffff_ffff_ffff_ffff_ffff_ffff;

const LAST_32_BITS: u128 = 0xffff_ffff;

/// The address kind a [`Canonical`] resolves to, after IPv6-transition
/// folding. There is no `None` variant: an unparsable address is reported
/// as [`InvalidAddress`] via [`Canonical::parse`]'s `Result`, kept out
/// of this enum so the rest of the query path never has to match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    V4,
    V6,
}

/// A parsed, canonicalized IP address ready for range lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonical {
    pub kind: Kind,
    pub number: u128,
}

impl Canonical {
    /// Parses `text` and folds IPv4-mapped, 6to4, and Teredo IPv6
    /// addresses down to their IPv4 equivalent.
    pub fn parse(text: &str) -> Result<Canonical, InvalidAddress> {
        let addr = IpAddr::from_str(text).map_err(|_| InvalidAddress)?;
        Ok(match addr {
            IpAddr::V4(v4) => Canonical {
                kind: Kind::V4,
                number: u32::from(v4) as u128,
            },
            IpAddr::V6(v6) => {
                let number = u128::from(v6);
                if (FROM_V4_MAPPED..=TO_V4_MAPPED).contains(&number) {
                    Canonical {
                        kind: Kind::V4,
                        number: number - FROM_V4_MAPPED,
                    }
                } else if (FROM_6TO4..=TO_6TO4).contains(&number) {
                    Canonical {
                        kind: Kind::V4,
                        number: (number >> 80) & LAST_32_BITS,
                    }
                } else if (FROM_TEREDO..=TO_TEREDO).contains(&number) {
                    Canonical {
                        kind: Kind::V4,
                        number: (!number) & LAST_32_BITS,
                    }
                } else {
                    Canonical {
                        kind: Kind::V6,
                        number,
                    }
                }
            }
        })
    }

    /// The top 16 bits used to bucket this address into the optional
    /// prefix index: bits 16..31 for a v4 number, bits 112..127 for v6.
    pub fn index_prefix(self) -> u32 {
        match self.kind {
            Kind::V4 => (self.number >> 16) as u32,
            Kind::V6 => (self.number >> 112) as u32,
        }
    }
}
