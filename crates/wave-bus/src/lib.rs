//! greenwave Signal Bus
//!
//! Typed replacement for page-global custom events. The navigator publishes
//! expand/collapse/activate signals, the rendering layer consumes them, and
//! views of the same wave reconcile unread state through
//! [`Signal::WaveUnreadChanged`].
//!
//! # Example
//!
//! ```rust,ignore
//! use wave_bus::{Signal, SignalBus, Topic};
//!
//! let bus = SignalBus::new();
//! let mut sub = bus.subscribe_to([Topic::ActivateBlip]);
//! bus.publish(Signal::ActivateBlip { blip_id: "b1".into() });
//! let signal = sub.recv().await?;
//! ```

#![warn(unreachable_pub)]

pub mod bus;
pub mod error;
pub mod signal;

pub use bus::{SignalBus, Subscription};
pub use error::BusError;
pub use signal::{Signal, Topic, ViewId};
