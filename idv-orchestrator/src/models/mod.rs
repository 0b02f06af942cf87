pub mod image;
pub mod result;
pub mod session;
pub mod token;

pub use image::{EncodedImage, ImageMetadata};
pub use result::{FaceAuthResult, Recommendation, VerificationResult};
pub use session::{FaceAuthSession, FlowKind, VerificationSession};
pub use token::AccessToken;
