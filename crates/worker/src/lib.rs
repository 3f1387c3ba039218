//! The sideout cache worker runtime.
//!
//! This crate provides the lifecycle controller (install/activate), the
//! control-message protocol, the notification bridge, and the `Worker`
//! that ties them to the strategy engine. The `sideout-worker` binary
//! boots a worker and serves the control protocol over stdio.

pub mod lifecycle;
pub mod messages;
pub mod notifications;
pub mod worker;

pub use messages::{ClientNotice, ClientRegistry, ControlReply, ControlRequest};
pub use notifications::{Notification, NotificationBridge, WindowOpener};
pub use worker::{Worker, WorkerState};
