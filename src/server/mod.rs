mod connection_manager;
mod maintenance;
mod notifier;
mod port;
mod rate_limiter;
mod server;

pub use connection_manager::*;
pub use maintenance::*;
pub use notifier::*;
pub use port::*;
pub use rate_limiter::*;
pub use server::*;
