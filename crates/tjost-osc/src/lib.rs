//! OSC wire codec for the tjost real-time host.
//!
//! Everything in this crate is a pure function over caller-supplied byte buffers:
//! no shared state, no threads, no allocation on the encode/decode paths. It can run
//! on the real-time thread as well as on any I/O thread.
//!
//! # Modules
//!
//! - [`codec`]: bounds-checked [`Writer`]/[`Reader`] cursors and padding helpers
//! - [`message`]: message encoding (including the vararg encoder) and [`MessageRef`]
//! - [`bundle`]: nested bundle encoding and [`BundleRef`]
//! - [`validate`]: structural checks for untrusted buffers
//! - [`unroll`]: bundle flattening with per-item time stamps
//! - [`framing`]: 4-byte length prefix framing for byte streams
//! - [`dispatch`]: ordered path/format method tables
//!
//! # Example
//!
//! ```
//! use tjost_osc::{encode_message, osc_args, validate, MessageRef};
//!
//! let mut buf = [0u8; 64];
//! let len = encode_message(&mut buf, "/synth/freq", &osc_args![1i32, 440.0f32]).unwrap();
//! assert!(validate::check_message(&buf[..len]));
//!
//! let msg = MessageRef::parse(&buf[..len]).unwrap();
//! assert_eq!(msg.path(), "/synth/freq");
//! assert_eq!(msg.format(), "if");
//! ```
//!
//! # Feature Flags
//!
//! - `std` (default) - [`NtpTime::now`] and conversions from `SystemTime`

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

#[macro_use]
mod macros;

pub mod error;
pub use error::{Error, Result};

mod timetag;
pub use timetag::NtpTime;

mod types;
pub use types::{Argument, MidiFrame, TypeTag};

pub mod codec;
pub use codec::{blob_len, padded_len, ElementMark, Reader, Writer};

pub mod message;
pub use message::{encode_message, encode_vararg, message_len, Arguments, MessageRef};

pub mod bundle;
pub use bundle::{BundleRef, BundleWriter, Elements, BUNDLE_TAG};

mod packet;
pub use packet::Packet;

pub mod validate;
pub use validate::MAX_BUNDLE_DEPTH;

pub mod unroll;
pub use unroll::{unroll, UnrollHandler, UnrollMode};

pub mod framing;
pub use framing::{encode_frame, FrameDecoder, FRAME_HEADER_LEN};

pub mod dispatch;
pub use dispatch::{Method, MethodTable};
