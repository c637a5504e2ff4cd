//! Message bus: channel payload types and typed broadcast channels.
//!
//! This module groups the **data model** exchanged between the connectivity
//! machine and the rest of the firmware, and the **bus** that carries it.
//!
//! ## Contents
//! - [`NetworkEvent`], [`Payload`] inbound messages
//! - [`CloudEvent`], [`ErrorEvent`] outbound messages
//! - [`Event`] the union observers receive through [`SubscriberSet`](crate::SubscriberSet)
//! - [`Channel`], [`Bus`] thin wrappers over `tokio::sync::broadcast`
//!
//! ## Channels
//! ```text
//!   network       NetworkEvent   inbound   link layer ──► machine
//!   payload       Payload        inbound   application ──► machine
//!   cloud-status  CloudEvent     outbound  machine ──► everyone
//!   error         ErrorEvent     outbound  machine ──► everyone
//! ```

mod bus;
mod message;

pub use bus::{Bus, Channel};
pub use message::{CloudEvent, ErrorEvent, ErrorKind, Event, NetworkEvent, Payload};
