//! Session-related types.

/// Session keys.
pub mod keys {
    /// Key for Google `OAuth` state (CSRF protection).
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";
}
