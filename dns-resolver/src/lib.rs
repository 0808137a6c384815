pub mod cache;
pub mod dispatch;
pub mod forwarder;

pub use cache::{Cache, LookupResult, SharedCache};
pub use dispatch::Dispatcher;
pub use forwarder::Forwarder;
