//! Utility functions for common operations.
//!
//! - **URL validation**: scheme checks plus SSRF protection for feed URLs
//! - **Domains**: deriving and validating the icon cache key
//! - **Time**: the engine's millisecond clock
//!
//! # Examples
//!
//! ```
//! use feedsync::util::{domain_of, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml", false).unwrap();
//! assert_eq!(domain_of(url.as_str()).as_deref(), Some("example.com"));
//! ```

mod url_validator;

pub use url_validator::{domain_of, is_valid_domain, validate_feed_url, UrlValidationError};

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
