/*
[INPUT]:  Unauthenticated API calls
[OUTPUT]: Network fee estimate with a degraded sentinel on failure
[POS]:    HTTP layer - public endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use tracing::warn;

use crate::http::BreadClient;
use crate::types::{FeeLookupError, FeePerKb, FeePerKbResponse, OutboundRequest};

impl BreadClient {
    /// Fetch the recommended fee rate
    ///
    /// GET /v1/fee-per-kb
    ///
    /// Never fails outright: a zero, missing, or undecodable value becomes
    /// [`FeeLookupError::InvalidJson`], and a dispatch failure becomes
    /// [`FeeLookupError::BadNetworkConnection`]. A real fee of zero cannot be
    /// told apart from a parse failure.
    pub async fn fee_per_kb(&self) -> FeePerKb {
        let request = OutboundRequest::get("/v1/fee-per-kb");
        let response = match self.send(&request, false).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "fee-per-kb network error");
                return FeePerKb::failed(FeeLookupError::BadNetworkConnection);
            }
        };

        let value = match response.json::<FeePerKbResponse>() {
            Ok(parsed) => parsed.fee_per_kb.unwrap_or(0),
            Err(e) => {
                warn!(status = response.status.as_u16(), error = %e, "fee-per-kb: error parsing json");
                0
            }
        };

        if value == 0 {
            return FeePerKb::failed(FeeLookupError::InvalidJson);
        }
        FeePerKb { value, error: None }
    }
}
