pub mod error;
pub mod logging;
pub mod validated_json;

pub use error::{ApiError, ApiResult, FieldError};
pub use logging::{LogGuard, init_logging, with_startup_logging};
pub use validated_json::ValidatedJson;
