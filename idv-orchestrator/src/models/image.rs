use serde::{Deserialize, Serialize};

pub const SELFIE_IMAGE_TYPE: &str = "selfie";

/// Metadata of one image attached to a verification session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageMetadata {
    #[serde(alias = "image_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub image_type: String,
    #[serde(default)]
    pub format: Option<String>,
}

impl ImageMetadata {
    pub fn is_selfie(&self) -> bool {
        self.image_type.trim().eq_ignore_ascii_case(SELFIE_IMAGE_TYPE)
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageList {
    #[serde(default)]
    pub images: Vec<ImageMetadata>,
}

/// Reference image ready for the face-auth API: a self-describing data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub image_id: String,
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
    /// Short format name, e.g. `jpg` or `png`.
    pub format: String,
}

/// `reference` object of the face-auth session request.
#[derive(Debug, Serialize)]
pub struct FaceAuthReference<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
    pub format: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateFaceAuthSessionRequest<'a> {
    pub reference: FaceAuthReference<'a>,
    pub use_case: &'a str,
}

impl<'a> CreateFaceAuthSessionRequest<'a> {
    pub fn new(image: &'a EncodedImage, use_case: &'a str) -> Self {
        Self {
            reference: FaceAuthReference {
                kind: "raw",
                content: &image.data_uri,
                format: &image.format,
            },
            use_case,
        }
    }
}
