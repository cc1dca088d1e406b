/*
[INPUT]:  Authenticated API calls and the local preferences store
[OUTPUT]: Server-driven feature flags cached locally
[POS]:    HTTP layer - user endpoints (require bread auth)
[UPDATE]: When adding new user endpoints or changing flag storage keys
*/

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::http::{BreadClient, BreadError, Result};
use crate::types::{FeatureEntry, FeatureFlag, OutboundRequest};

/// Preferences key under which a feature flag is cached
pub fn feature_flag_key(name: &str) -> String {
    format!("ff:{name}")
}

impl BreadClient {
    /// Refresh cached feature flags
    ///
    /// GET /me/features
    ///
    /// Returns how many flags were stored. Malformed entries are skipped, and
    /// an undecodable body stores nothing.
    pub async fn update_feature_flags(&self) -> Result<usize> {
        let request = OutboundRequest::get("/me/features");
        let response = self
            .send(&request, true)
            .await
            .inspect_err(|e| warn!(error = %e, "error fetching features"))?;

        if response.is_bread_challenge() {
            return Err(BreadError::ChallengeRetryExhausted { path: request.path });
        }
        if response.status != StatusCode::OK {
            return Err(BreadError::api_error(response.status, response.text()));
        }

        let entries: Vec<serde_json::Value> = match response.json() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "error loading features json");
                return Ok(0);
            }
        };

        let mut stored = 0;
        for entry in &entries {
            match FeatureEntry::deserialize(entry) {
                Ok(feature) => {
                    info!(feature = %feature.name, enabled = feature.enabled, "feature flag");
                    self.preferences()
                        .set_bool(&feature_flag_key(&feature.name), feature.enabled);
                    stored += 1;
                }
                Err(e) => warn!(entry = %entry, error = %e, "malformed feature"),
            }
        }
        Ok(stored)
    }

    /// Cached value of `flag`; unknown flags are off
    pub fn feature_enabled(&self, flag: FeatureFlag) -> bool {
        self.preferences()
            .get_bool(&feature_flag_key(flag.name()))
            .unwrap_or(false)
    }
}
