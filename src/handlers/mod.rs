mod capabilities;
mod events;
mod health;
mod identity;

pub use capabilities::{portal_links, retention_policy, sso_settings};
pub use events::{ingest_event, list_events};
pub use health::health_check;
pub use identity::{personal_token_owner, whoami};
