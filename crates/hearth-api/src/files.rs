use std::fmt;
use std::str::FromStr;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use hearth_types::api::UploadResponse;
use hearth_types::models::Session;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Content types accepted as payment proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Jpeg,
    Png,
    Webp,
    Pdf,
}

impl ArtifactKind {
    pub fn from_content_type(value: &str) -> Option<Self> {
        let mime = value.split(';').next().unwrap_or("").trim();
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        [Self::Jpeg, Self::Png, Self::Webp, Self::Pdf]
            .into_iter()
            .find(|k| k.extension() == ext)
    }
}

/// `{uuid}.{ext}`. Parsing it is what keeps client paths out of the
/// storage directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactName {
    pub id: Uuid,
    pub kind: ArtifactKind,
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.kind.extension())
    }
}

impl FromStr for ArtifactName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, ext) = s.rsplit_once('.').ok_or(())?;
        Ok(Self {
            id: id.parse().map_err(|_| ())?,
            kind: ArtifactKind::from_extension(ext).ok_or(())?,
        })
    }
}

/// POST /artifacts: raw body, typed by its Content-Type header. Returns the
/// public URL to attach as a payment proof.
pub async fn upload_artifact(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::bad_request("artifact body is empty"));
    }
    if bytes.len() > state.max_artifact_bytes {
        return Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "too_large",
            format!("artifacts are limited to {} bytes", state.max_artifact_bytes),
        ));
    }
    let kind = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ArtifactKind::from_content_type)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "artifacts must be JPEG, PNG, WebP or PDF",
            )
        })?;

    let name = ArtifactName {
        id: Uuid::new_v4(),
        kind,
    };
    state
        .storage
        .write(&name.to_string(), &bytes)
        .await
        .map_err(|e| ApiError::internal("artifact write failed", e))?;

    info!("Artifact {} uploaded by {} ({} bytes)", name, session.user_id, bytes.len());
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("{}/artifacts/{}", state.public_url, name),
            size: bytes.len() as u64,
        }),
    ))
}

/// GET /artifacts/{name}. Unauthenticated: proof URLs are plain links.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let parsed: ArtifactName = name
        .parse()
        .map_err(|_| ApiError::not_found("no such artifact"))?;

    let bytes = state
        .storage
        .read(&parsed.to_string())
        .await
        .map_err(|e| ApiError::internal("artifact read failed", e))?
        .ok_or_else(|| ApiError::not_found("no such artifact"))?;

    Ok((
        [
            (header::CONTENT_TYPE, parsed.kind.content_type()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}
