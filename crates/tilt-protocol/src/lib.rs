//! # tilt-protocol
//!
//! Wire formats for the tilt-relay endpoints.
//!
//! Producers push [`ProducerUpdate`] documents; consumers receive an
//! [`Aggregate`] mapping each numeric producer id to its latest
//! [`DeviceOrientation`].
//!
//! ## Example
//!
//! ```rust
//! use tilt_protocol::{codec, Aggregate, DeviceOrientation};
//!
//! let update = codec::decode_update(br#"{"ID":"1","username":"a","beta":0.5,"gamma":-0.2}"#).unwrap();
//!
//! let mut aggregate = Aggregate::new();
//! aggregate.insert(1, DeviceOrientation {
//!     username: update.username,
//!     fb_tilt: update.beta,
//!     lr_tilt: update.gamma,
//!     last_update: 12,
//! });
//! let payload = codec::encode_aggregate(&aggregate).unwrap();
//! assert!(payload.starts_with(r#"{"1":"#));
//! ```

pub mod codec;
pub mod messages;

pub use codec::{decode_update, encode_aggregate, Payload, ProtocolError};
pub use messages::{aggregate_key, Aggregate, DeviceOrientation, ProducerUpdate};
