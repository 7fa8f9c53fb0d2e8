use axum::Json;

use crate::domain::{preference_options, PreferenceOptions};

pub async fn list_options() -> Json<PreferenceOptions> {
    Json(preference_options())
}
