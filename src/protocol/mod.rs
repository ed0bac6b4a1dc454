//! Relay wire protocol
//!
//! Every event travels as one length-prefixed JSON frame:
//!
//! ```text
//! +----------------+-------------------------------------------+
//! | length: u32 BE | {"event":"join","data":{"matchId":"m1"}}  |
//! +----------------+-------------------------------------------+
//! ```
//!
//! Subscribers send `join` and `leave`, the writer sends `publish`, and the
//! server sends `updated` to the members of the published room. There are no
//! acknowledgements; delivery is best-effort.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{FrameCodec, FrameReader};
pub use message::{ClientEvent, ServerEvent};
