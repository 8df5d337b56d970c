mod error;
mod handler;
mod rate_limit;
mod router;

pub use error::{ApiError, ApiErrorCode, recover_error};
pub use handler::ApiResponse;
pub use rate_limit::admission;
pub use router::{realtime, routes};
