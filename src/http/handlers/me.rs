//! The signed-in user's own account.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{ProfileUpdate, SafeUser};
use crate::http::extract::CurrentUser;
use crate::http::handlers::media::read_file_field;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::media::storage::{profile_image_filename, profile_image_public_path};
use crate::media::{sniff, MediaKind};
use crate::observability::metrics;

const MAX_DISPLAY_NAME_CHARS: usize = 80;
const MAX_BIO_CHARS: usize = 280;
const MAX_IMAGE_URL_CHARS: usize = 2048;

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "user": SafeUser::from(&user) }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
}

impl ProfilePatch {
    fn validated(self) -> Option<ProfileUpdate> {
        let display_name = match self.display_name {
            Some(name) => {
                let name = name.trim().to_string();
                let len = name.chars().count();
                if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
                    return None;
                }
                Some(name)
            }
            None => None,
        };

        let bio = match self.bio {
            Some(bio) => {
                let bio = bio.trim().to_string();
                if bio.chars().count() > MAX_BIO_CHARS {
                    return None;
                }
                Some(bio)
            }
            None => None,
        };

        let profile_image_url = match self.profile_image_url {
            Some(url) => {
                let url = url.trim();
                if url.len() > MAX_IMAGE_URL_CHARS || profile_image_filename(url).is_none() {
                    return None;
                }
                Some(url.to_string())
            }
            None => None,
        };

        if display_name.is_none() && bio.is_none() && profile_image_url.is_none() {
            return None;
        }

        Some(ProfileUpdate {
            display_name,
            bio,
            profile_image_url,
        })
    }
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let update = payload
        .ok()
        .and_then(|Json(patch)| patch.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid profile payload.".into()))?;

    let updated = state
        .users
        .update_profile(user.id, update)
        .ok_or(ApiError::Unauthorized)?;
    tracing::debug!(user_id = %updated.id, "Profile updated");

    Ok(Json(json!({ "user": SafeUser::from(&updated) })))
}

pub async fn upload_profile_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let missing = || ApiError::BadRequest("Profile image file is required.".into());
    let multipart = multipart.map_err(|_| missing())?;
    let upload = read_file_field(multipart).await?.ok_or_else(missing)?;

    let sniffed = sniff::sniff(&upload.bytes, state.config.uploads.max_profile_image_bytes)?;
    let filename = state
        .storage
        .save(MediaKind::ProfileImage, sniffed.format, &upload.bytes)
        .await?;

    metrics::record_upload(MediaKind::ProfileImage.label(), sniffed.format.extension());
    tracing::info!(
        user_id = %user.id,
        filename = %filename,
        size = sniffed.size_bytes,
        "Profile image stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "publicUrl": profile_image_public_path(&filename) })),
    ))
}
