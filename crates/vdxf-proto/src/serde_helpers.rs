//! Field adapters for the JSON projection.
//!
//! Bytes render as hex (signatures as base64), unbounded integers as decimal
//! strings. Use with `#[serde(with = "...")]`.

use crate::errors::{ProtocolError, Result};

/// Hex text to bytes, failing with [`ProtocolError::InvalidHex`].
pub(crate) fn decode_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|err| ProtocolError::InvalidHex(err.to_string()))
}

/// `Bytes` as lowercase hex.
pub mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as hex.
    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    /// Deserialize from hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_hex(&text).map(Bytes::from).map_err(serde::de::Error::custom)
    }
}

/// `Option<Bytes>` as lowercase hex.
pub mod hex_bytes_opt {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as hex; pair with `skip_serializing_if = "Option::is_none"`.
    pub fn serialize<S: Serializer>(
        value: &Option<Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Bytes>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| super::decode_hex(&text).map(Bytes::from).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// `Option<Vec<Bytes>>` as a list of lowercase hex strings.
pub mod hex_bytes_vec_opt {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a hex list; pair with `skip_serializing_if`.
    pub fn serialize<S: Serializer>(
        value: &Option<Vec<Bytes>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(items) => serializer.collect_seq(items.iter().map(hex::encode)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a hex list.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<Bytes>>, D::Error> {
        Option::<Vec<String>>::deserialize(deserializer)?
            .map(|items| {
                items
                    .into_iter()
                    .map(|text| {
                        super::decode_hex(&text).map(Bytes::from).map_err(serde::de::Error::custom)
                    })
                    .collect()
            })
            .transpose()
    }
}

/// `Bytes` as standard base64.
pub mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as base64.
    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    /// Deserialize from base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map(Bytes::from).map_err(serde::de::Error::custom)
    }
}

/// `BigUint` as a decimal string.
pub mod biguint_dec {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as decimal.
    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize from decimal.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// `u64` as a decimal string.
pub mod u64_dec {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as decimal.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize from decimal.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// `Option<u64>` as a decimal string.
pub mod u64_dec_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as decimal; pair with `skip_serializing_if = "Option::is_none"`.
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(number) => serializer.collect_str(number),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from decimal.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| text.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use num_bigint::BigUint;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::hex_bytes")]
        data: Bytes,
        #[serde(with = "super::base64_bytes")]
        sig: Bytes,
        #[serde(with = "super::biguint_dec")]
        big: BigUint,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "super::hex_bytes_opt")]
        extra: Option<Bytes>,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "super::u64_dec_opt")]
        stamp: Option<u64>,
    }

    #[test]
    fn encodings_round_trip() {
        let sample = Sample {
            data: Bytes::from_static(&[0xde, 0xad]),
            sig: Bytes::from_static(b"hi"),
            big: BigUint::from(u128::MAX),
            extra: None,
            stamp: None,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"data":"dead","sig":"aGk=","big":"340282366920938463463374607431768211455"}"#
        );
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }

    #[test]
    fn optional_integers_are_decimal_strings() {
        let json = r#"{"data":"","sig":"","big":"0","stamp":"18446744073709551615"}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.stamp, Some(u64::MAX));
        assert_eq!(serde_json::to_string(&sample).unwrap(), json);

        let number = r#"{"data":"","sig":"","big":"0","stamp":7}"#;
        assert!(serde_json::from_str::<Sample>(number).is_err());
    }

    #[test]
    fn bad_hex_reports_invalid_hex() {
        let err = serde_json::from_str::<Sample>(r#"{"data":"zz","sig":"","big":"0"}"#)
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("invalid hex:"), "{err}");

        let odd = r#"{"data":"","sig":"","big":"0","extra":"abc"}"#;
        let err = serde_json::from_str::<Sample>(odd).unwrap_err().to_string();
        assert!(err.starts_with("invalid hex:"), "{err}");

        assert!(matches!(
            super::decode_hex("0g"),
            Err(crate::errors::ProtocolError::InvalidHex(_))
        ));
    }
}
