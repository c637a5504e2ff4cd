//! # Cloud session transport contract.
//!
//! The concrete transport (CoAP, MQTT, ...) lives outside this crate. The
//! connectivity machine drives it only through [`CloudClient`], and only
//! interprets what the client reports through [`ConnectOutcome`].
//!
//! - [`CloudClient`] - `connect` / `disconnect` / `send`
//! - [`ConnectOutcome`] - `Success | RetryableFailure | FatalFailure`
//! - [`SendFlags`] - per-payload delivery reliability flags

mod client;

pub use client::{CloudClient, ConnectOutcome, SendFlags};
