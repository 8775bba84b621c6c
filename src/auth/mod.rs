//! Session authentication: cookie plumbing, failure taxonomy, and the
//! request guard with silent access-token renewal.
//!
//! Dual-token scheme: a short-lived stateless access token and a
//! long-lived refresh token that is only trusted while it matches the
//! server-side registry entry for its subject. When an access token
//! expires mid-session, the guard mints a replacement from the refresh
//! token in the same request, so a logged-in user never sees the expiry.

mod cookie;
mod errors;
mod extractors;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::AuthError;
pub use extractors::{Auth, HasAuthState, renewed_access_cookie, require_owner};
