//! Authenticated-request gateway.
//!
//! Every request is classified by path ([`crate::policy`]), and requests to
//! protected routes must carry a session token that the identity provider
//! accepts. Resolved sessions are cached briefly so repeat requests do not
//! hit the provider each time.

mod cache;
mod cookie;
mod errors;
mod extractors;
mod gate;
mod ip;
mod resolver;
mod types;

pub use cache::{Clock, ManualClock, SessionCache, SessionCacheEntry, SystemClock};
pub use cookie::{
    SESSION_COOKIE_NAME, clear_session_cookie, extract_session_token, get_bearer_token, get_cookie,
    session_cookie,
};
pub use errors::{GateRejection, UNAUTHORIZED_MESSAGE};
pub use extractors::{Auth, OptionalAuth};
pub use gate::{AccessGate, GateOutcome, RequestContext, access_gate};
pub use ip::extract_client_ip;
pub use resolver::{DEFAULT_CACHE_TTL_SECS, ResolveError, SessionResolver};
pub use types::Identity;
