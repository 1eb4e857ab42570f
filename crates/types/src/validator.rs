use core::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Consensus public key of a validator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PublicKey {
    Ed25519(Bytes),
    Secp256k1(Bytes),
}

impl PublicKey {
    pub fn ed25519(bytes: impl Into<Bytes>) -> Self {
        Self::Ed25519(bytes.into())
    }

    pub fn secp256k1(bytes: impl Into<Bytes>) -> Self {
        Self::Secp256k1(bytes.into())
    }

    pub fn key_type(&self) -> &'static str {
        match self {
            PublicKey::Ed25519(_) => "ed25519",
            PublicKey::Secp256k1(_) => "secp256k1",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(b) | PublicKey::Secp256k1(b) => b,
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type(), hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Serialize, Deserialize)]
struct PublicKeyRepr {
    #[serde(rename = "type")]
    key_type: String,
    value: String,
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PublicKeyRepr { key_type: self.key_type().to_string(), value: hex::encode(self.as_bytes()) }
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let repr = PublicKeyRepr::deserialize(deserializer)?;
        let bytes = Bytes::from(hex::decode(&repr.value).map_err(D::Error::custom)?);
        match repr.key_type.as_str() {
            "ed25519" => Ok(PublicKey::Ed25519(bytes)),
            "secp256k1" => Ok(PublicKey::Secp256k1(bytes)),
            other => Err(D::Error::custom(format!("unknown public key type: {other}"))),
        }
    }
}

/// Instruction to add, remove or re-weight a validator. A power of zero removes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PublicKey,
    pub power: i64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: PublicKey, power: i64) -> Self {
        Self { pub_key, power }
    }

    pub fn is_removal(&self) -> bool {
        self.power == 0
    }
}
