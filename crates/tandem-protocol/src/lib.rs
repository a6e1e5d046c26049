//! Wire protocol for Tandem.
//!
//! This crate defines the little that the relay itself says on the wire:
//!
//! - **Types** ([`RoomId`], [`Status`]) — room identity and the activation
//!   notice sent to seated participants.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how notices are turned
//!   into text frames.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Room (seats, relay) → Protocol (Status)
//! ```
//!
//! Game data is relayed untouched and never reaches this crate.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{RoomId, Status};
