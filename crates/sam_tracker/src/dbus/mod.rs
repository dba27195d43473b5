//! # DBus interface proxies
//!
//! `SamService` is the App Manager queue service. Its members are named in snake_case on the bus, so every member
//! spells out its wire name. `Notifications` is the subset of the
//! [desktop notifications specification](https://specifications.freedesktop.org/notification-spec/latest/) that we
//! use to present progress.

mod sam_service;
pub use sam_service::*;

mod notifications;
pub use notifications::*;
