/*
[INPUT]:  Feature flag names published by /me/features
[OUTPUT]: Typed feature flag identifiers
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the server publishes new persistent flag names
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature flags the wallet knows how to query.
///
/// The string form is the persistent name used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureFlag {
    /// Published as `buy-xxx`
    #[serde(rename = "buy-xxx")]
    BuyBitcoin,
    EarlyAccess,
}

impl FeatureFlag {
    pub fn name(self) -> &'static str {
        match self {
            FeatureFlag::BuyBitcoin => "buy-xxx",
            FeatureFlag::EarlyAccess => "early-access",
        }
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
