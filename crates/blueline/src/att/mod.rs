//! Attribute Protocol (ATT) definitions
//!
//! The worker speaks ATT to the peripheral; this crate only needs the error code
//! set it reports back and the well-known declaration UUIDs that delimit
//! services and characteristics in a GATT table.

pub mod constants;
pub mod error;

pub use self::constants::*;
pub use self::error::AttErrorCode;
