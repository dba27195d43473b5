pub mod dbus;

mod error;
pub use error::*;

mod util;

mod task;
pub use task::*;

mod snapshot;
pub use snapshot::*;

mod client;
pub use client::*;

mod presenter;
pub use presenter::*;

mod tracker;
pub use tracker::*;

mod session;
pub use session::*;
