//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Networks the aggregator can route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Avalanche,
    Solana,
}

impl Chain {
    /// Path segment used by the aggregator API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Avalanche => "avalanche",
            Chain::Solana => "solana",
        }
    }

    /// Chains where the recipient needs an account for the output token
    /// before a swap can land.
    pub fn requires_account_preparation(&self) -> bool {
        matches!(self, Chain::Solana)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "bsc" => Ok(Chain::Bsc),
            "polygon" => Ok(Chain::Polygon),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            "avalanche" => Ok(Chain::Avalanche),
            "solana" | "sol" => Ok(Chain::Solana),
            other => Err(format!("unsupported chain: {}", other)),
        }
    }
}

/// Serde helpers for token amounts, which the aggregator sends as decimal strings.
pub mod amount_string {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.trim().parse::<u128>().map_err(|e| E::custom(format!("invalid amount {:?}: {}", v, e)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Same as [`amount_string`] for signed deltas.
pub mod signed_amount_string {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        struct SignedVisitor;

        impl<'de> Visitor<'de> for SignedVisitor {
            type Value = i128;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i128, E> {
                Ok(v as i128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i128, E> {
                Ok(v as i128)
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<i128, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i128, E> {
                v.trim().parse::<i128>().map_err(|e| E::custom(format!("invalid amount {:?}: {}", v, e)))
            }
        }

        deserializer.deserialize_any(SignedVisitor)
    }
}
