#[allow(non_snake_case)]
pub mod status_code;

pub mod status;
pub mod result;

pub mod ids;
pub mod time;

// Re-export commonly used items at the crate root.
pub use ids::ServiceUuid;
pub use result::{make_error, make_error_msg, Result};
pub use status::Status;
pub use status_code::*;
pub use time::UtcTime;
