//! Session tracking - client-held session identity and per-page dwell logging
pub mod cookie;
pub mod id_gen;
pub mod state;
pub mod tracker;

pub use cookie::{SessionCodec, SESSION_COOKIE_NAME};
pub use id_gen::{RandomIdGenerator, SequentialIdGenerator, SessionIdGenerator};
pub use state::{SessionContext, SessionCookie, SessionState};
pub use tracker::{track_page_views, SessionTracker, TrackedRoutes};
