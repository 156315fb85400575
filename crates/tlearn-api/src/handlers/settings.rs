//! Settings handlers: the per-user AI backend configuration surface.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tlearn_db::{SettingsRepository, UserRepository};
use tlearn_models::{AiProvider, AiSettings};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Settings response. The API key itself never leaves the server.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub has_api_key: bool,
}

impl From<AiSettings> for SettingsResponse {
    fn from(s: AiSettings) -> Self {
        Self {
            provider: s.provider.as_str().to_string(),
            model: s.model,
            base_url: s.base_url,
            has_api_key: s.api_key.is_some(),
        }
    }
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SettingsResponse>> {
    let settings = SettingsRepository::new(state.db.clone()).get(&user.uid).await?;
    Ok(Json(SettingsResponse::from(settings)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// POST /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    let provider = AiProvider::parse(&request.provider)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown AI provider: {}", request.provider)))?;

    if request.model.is_empty() {
        return Err(ApiError::bad_request("model required"));
    }

    let settings = AiSettings {
        provider,
        model: request.model,
        api_key: request.api_key.filter(|k| !k.is_empty()),
        base_url: request.base_url.filter(|u| !u.is_empty()),
    };

    // Make sure the user row exists before the settings row references it.
    UserRepository::new(state.db.clone())
        .upsert(&user.uid, user.email.as_deref())
        .await?;
    SettingsRepository::new(state.db.clone())
        .upsert(&user.uid, &settings)
        .await?;

    Ok(Json(SettingsResponse::from(settings)))
}
