// Core primitives shared by the pool, the bridge and the client
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::error::{PoolError, Result};

/// Unsigned token amount in base units
pub type Amount = u128;
/// Signed balance delta: positive for deposits, negative for withdrawals
pub type ExtAmount = i128;
/// Position of a commitment in the accumulator
pub type LeafIndex = u64;

/// Decimals of the custodial asset
pub const TOKEN_DECIMALS: u32 = 18;

/// SHA-256 digest used for identifiers and key fingerprints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn zero() -> Self {
        Hash256([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn from_data(data: &[u8]) -> Self {
        hash_data(data)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 20-byte account address, valid on both the local and the remote domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Deterministic address derived from a label, handy for fixtures and demos
    pub fn from_label(label: &str) -> Self {
        let digest = hash_data(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[..20]);
        Address(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| PoolError::Serialization(format!("invalid address hex: {}", e)))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| PoolError::Serialization("address must be 20 bytes".to_string()))?;
        Ok(Address(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! field_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "field_serde")] pub Fr);

        impl $name {
            pub fn inner(&self) -> Fr {
                self.0
            }

            pub fn to_bytes(&self) -> [u8; 32] {
                field_to_bytes(&self.0)
            }
        }

        impl From<Fr> for $name {
            fn from(value: Fr) -> Self {
                $name(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", field_to_hex(&self.0))
            }
        }
    };
}

field_newtype!(
    /// Poseidon commitment to a note's (amount, public key, blinding)
    Commitment
);
field_newtype!(
    /// Spend tag published when a note is consumed
    Nullifier
);
field_newtype!(
    /// Root of the commitment accumulator
    MerkleRoot
);

pub fn hash_data(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash256(hasher.finalize().into())
}

/// Hash arbitrary bytes into the BN254 scalar field
pub fn hash_to_field(data: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(hash_data(data).as_bytes())
}

/// Canonical 32-byte big-endian encoding of a field element
pub fn field_to_bytes(value: &Fr) -> [u8; 32] {
    let raw = value.into_bigint().to_bytes_be();
    let mut bytes = [0u8; 32];
    bytes[32 - raw.len()..].copy_from_slice(&raw);
    bytes
}

/// Decode a canonical big-endian field element, rejecting values >= the modulus
pub fn field_from_bytes(bytes: &[u8; 32]) -> Option<Fr> {
    let value = Fr::from_be_bytes_mod_order(bytes);
    if field_to_bytes(&value) == *bytes {
        Some(value)
    } else {
        None
    }
}

pub fn field_to_hex(value: &Fr) -> String {
    format!("0x{}", hex::encode(field_to_bytes(value)))
}

pub fn field_from_hex(s: &str) -> Result<Fr> {
    let raw = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| PoolError::Serialization(format!("invalid field hex: {}", e)))?;
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| PoolError::Serialization("field element must be 32 bytes".to_string()))?;
    field_from_bytes(&bytes)
        .ok_or_else(|| PoolError::Serialization("field element is not canonical".to_string()))
}

pub fn amount_to_field(amount: Amount) -> Fr {
    Fr::from(amount)
}

/// Signed amounts map to the field the way the circuit sees them: -x becomes p - x
pub fn ext_amount_to_field(amount: ExtAmount) -> Fr {
    let magnitude = Fr::from(amount.unsigned_abs());
    if amount < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Parse a decimal string such as "0.05" into base units
pub fn parse_units(value: &str, decimals: u32) -> Result<Amount> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(PoolError::Config(format!("invalid amount '{}'", value)));
    }
    if fraction.len() > decimals as usize {
        return Err(PoolError::Config(format!(
            "amount '{}' has more than {} decimals",
            value, decimals
        )));
    }
    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| PoolError::Config("decimals out of range".to_string()))?;
    let parse = |digits: &str| -> Result<Amount> {
        if digits.is_empty() {
            return Ok(0);
        }
        digits
            .parse::<Amount>()
            .map_err(|e| PoolError::Config(format!("invalid amount '{}': {}", value, e)))
    };
    let whole_units = parse(whole)?
        .checked_mul(scale)
        .ok_or_else(|| PoolError::Config(format!("amount '{}' overflows", value)))?;
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    whole_units
        .checked_add(parse(&padded)?)
        .ok_or_else(|| PoolError::Config(format!("amount '{}' overflows", value)))
}

pub fn format_units(amount: Amount, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// serde adapter encoding field elements as 0x-prefixed big-endian hex
pub mod field_serde {
    use super::{field_from_hex, field_to_hex};
    use ark_bn254::Fr;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(deserializer)?;
        field_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("0.05", 18).unwrap(), 50_000_000_000_000_000);
        assert_eq!(parse_units("1", 18).unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_units("10000", 18).unwrap(), 10_000 * 10u128.pow(18));
        assert_eq!(parse_units(".5", 1).unwrap(), 5);
        assert!(parse_units("0.0000000000000000001", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("", 18).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(parse_units("0.02", 18).unwrap(), 18), "0.02");
        assert_eq!(format_units(parse_units("3", 18).unwrap(), 18), "3");
    }

    #[test]
    fn test_negative_amounts_wrap_in_field() {
        let withdraw = ext_amount_to_field(-80);
        assert_eq!(withdraw + Fr::from(80u64), Fr::from(0u64));
        assert_eq!(ext_amount_to_field(100), Fr::from(100u64));
    }

    #[test]
    fn test_field_hex_rejects_non_canonical() {
        let value = hash_to_field(b"field");
        let hex = field_to_hex(&value);
        assert_eq!(field_from_hex(&hex).unwrap(), value);

        let all_ones = format!("0x{}", "ff".repeat(32));
        assert!(field_from_hex(&all_ones).is_err());
    }

    #[test]
    fn test_address_hex() {
        let address = Address::from_hex("0xDeaD00000000000000000000000000000000BEEf").unwrap();
        assert_eq!(address.to_hex(), "0xdead00000000000000000000000000000000beef");
        assert!(!address.is_zero());
        assert!(Address::ZERO.is_zero());
        assert!(Address::from_hex("0x1234").is_err());
    }
}
