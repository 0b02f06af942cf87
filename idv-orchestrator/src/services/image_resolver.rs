//! Reference (selfie) image lookup on a completed verification session.

use crate::error::IdvError;
use crate::models::image::ImageList;
use crate::models::{AccessToken, EncodedImage, ImageMetadata};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use idv_core::http::{read_bytes, read_json, BinaryBody};
use idv_core::ApiClient;
use tracing::instrument;

use super::session_gateway::VERIFICATION_PATH;

pub const IMAGES_PATH: &str = "/verify/api/v1/images";

const DEFAULT_MIME: &str = "image/jpeg";

#[async_trait]
pub trait ReferenceImageSource: Send + Sync {
    async fn resolve_reference_image(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<EncodedImage, IdvError>;
}

#[derive(Clone)]
pub struct ImageResolver {
    api: ApiClient,
}

impl ImageResolver {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Images attached to a verification session, in server order.
    ///
    /// A session the server does not know has no reference image.
    pub async fn list_images(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<Vec<ImageMetadata>, IdvError> {
        let path = format!(
            "{}/{}/images",
            VERIFICATION_PATH,
            urlencoding::encode(session_id)
        );

        let response = self
            .api
            .get_with_auth(&path, token.secret())
            .await
            .map_err(IdvError::ReferenceImageFetch)?;

        match read_json::<ImageList>(response).await {
            Ok(list) => Ok(list.images),
            Err(e) if e.is_not_found() => Err(IdvError::ReferenceImageNotFound {
                session_id: session_id.to_string(),
            }),
            Err(e) => Err(IdvError::ReferenceImageFetch(e)),
        }
    }

    /// Binary content of one image.
    pub async fn fetch_image(
        &self,
        image_id: &str,
        token: &AccessToken,
    ) -> Result<BinaryBody, IdvError> {
        let path = format!("{}/{}", IMAGES_PATH, urlencoding::encode(image_id));

        let response = self
            .api
            .get_with_auth(&path, token.secret())
            .await
            .map_err(IdvError::ReferenceImageFetch)?;

        read_bytes(response)
            .await
            .map_err(IdvError::ReferenceImageFetch)
    }
}

/// First selfie-typed entry in server order.
pub fn select_reference(images: &[ImageMetadata]) -> Option<&ImageMetadata> {
    images.iter().find(|image| image.is_selfie())
}

/// Encode image bytes as a `data:` URI for the face-auth API.
pub fn encode_data_uri(image: &ImageMetadata, body: &BinaryBody) -> EncodedImage {
    let mime = media_type(image, body.content_type.as_deref());
    let format = short_format(&mime);
    let payload = general_purpose::STANDARD.encode(&body.bytes);

    EncodedImage {
        image_id: image.id.clone(),
        data_uri: format!("data:{};base64,{}", mime, payload),
        format,
    }
}

fn media_type(image: &ImageMetadata, content_type: Option<&str>) -> String {
    if let Some(declared) = content_type {
        let essence = declared.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence.starts_with("image/") {
            return essence;
        }
    }

    match image.format.as_deref().map(|f| f.trim().to_ascii_lowercase()) {
        Some(f) if f == "jpg" || f == "jpeg" => DEFAULT_MIME.to_string(),
        Some(f) if !f.is_empty() => format!("image/{}", f),
        _ => DEFAULT_MIME.to_string(),
    }
}

fn short_format(mime: &str) -> String {
    match mime.strip_prefix("image/") {
        Some("jpeg") | None => "jpg".to_string(),
        Some(subtype) => subtype.to_string(),
    }
}

#[async_trait]
impl ReferenceImageSource for ImageResolver {
    #[instrument(skip(self, token))]
    async fn resolve_reference_image(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<EncodedImage, IdvError> {
        let images = self.list_images(session_id, token).await?;

        let reference = select_reference(&images).ok_or_else(|| {
            tracing::warn!(images = images.len(), "No selfie image on verification session");
            IdvError::ReferenceImageNotFound {
                session_id: session_id.to_string(),
            }
        })?;

        let body = self.fetch_image(&reference.id, token).await?;
        if body.bytes.is_empty() {
            tracing::warn!(image_id = %reference.id, "Selfie image has no content");
            return Err(IdvError::ReferenceImageNotFound {
                session_id: session_id.to_string(),
            });
        }

        let encoded = encode_data_uri(reference, &body);
        tracing::info!(
            image_id = %encoded.image_id,
            format = %encoded.format,
            bytes = body.bytes.len(),
            "Reference image resolved"
        );

        Ok(encoded)
    }
}
