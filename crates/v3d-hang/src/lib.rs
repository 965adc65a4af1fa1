#![forbid(unsafe_code)]

//! Captured V3D hang-state container: the hardware register header, the
//! buffer-object descriptors, and the raw buffer contents, plus translation
//! between GPU physical addresses and captured buffer bytes.
//!
//! The container is produced by the capture utility, which writes the
//! hang-state ioctl structures verbatim followed by each buffer's bytes. This
//! crate only consumes that layout; it never touches the hardware.

mod error;
mod snapshot;
mod translate;

pub use error::HangDumpError;
pub use snapshot::{BufferObject, HangDump, HangState, BO_DESCRIPTOR_SIZE, HANG_STATE_SIZE};
pub use translate::{AddrMap, Location};
