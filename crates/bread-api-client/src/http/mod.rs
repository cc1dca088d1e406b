/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod public;
pub mod signature;
pub mod user;

pub use error::{BreadError, Result};
pub use signature::{
    Clock, RequestSigner, SystemClock, authorization_value, build_canonical_string, http_date,
};
pub use user::feature_flag_key;

pub use client::{BreadClient, ClientConfig, ClientServices};
