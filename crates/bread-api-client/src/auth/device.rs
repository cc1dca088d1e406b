/*
[INPUT]:  Local preferences store
[OUTPUT]: Stable per-install device identifier
[POS]:    Auth layer - device identity sent with token requests
[UPDATE]: When device identifier format or storage key changes
*/

use tracing::info;
use uuid::Uuid;

use crate::prefs::Preferences;

const DEVICE_ID_KEY: &str = "device_id";

/// Return the persisted device UUID, generating it on first use
pub fn device_id(preferences: &dyn Preferences) -> String {
    if let Some(existing) = preferences.get(DEVICE_ID_KEY) {
        return existing;
    }
    let generated = Uuid::new_v4().to_string().to_uppercase();
    preferences.set(DEVICE_ID_KEY, generated.clone());
    info!(device_id = %generated, "new device id");
    generated
}
