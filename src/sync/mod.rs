mod engine;

pub use engine::{parse_http_url, SyncEngine, SyncEvent};
