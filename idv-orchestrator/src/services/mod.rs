pub mod image_resolver;
pub mod metrics;
pub mod session_gateway;
pub mod token_provider;

pub use image_resolver::{ImageResolver, ReferenceImageSource};
pub use metrics::{get_metrics, init_metrics};
pub use session_gateway::{SessionApi, SessionGateway};
pub use token_provider::{AccessTokenSource, ClientCredentials, TokenProvider};
