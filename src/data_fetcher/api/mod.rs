pub mod fetch_utils;
pub mod http_client;
pub mod source;
pub mod urls;

// Re-export URL utilities
pub use urls::*;
// Re-export HTTP client utilities
pub use http_client::create_http_client_with_timeout;
// Re-export the source client
pub use fetch_utils::{RetryPolicy, fetch_raw};
pub use source::{HvwSourceClient, LeagueSource};
