#![forbid(unsafe_code)]

//! Control-list decoder for V3D hang dumps.
//!
//! Walks the binner and renderer command streams out of a captured
//! [`v3d_hang::HangDump`], dispatching on the fixed opcode table and the
//! compressed-primitive sub-encoding, and follows every discovered
//! cross-reference (sub-lists, compressed-list branch targets, shader
//! records, shader code) through a deduplicating area registry so each
//! region is decoded exactly once.
//!
//! The output is a stream of structured [`Record`]s; rendering them is the
//! caller's concern.

mod areas;
mod compressed;
mod opcode;
mod report;
mod shader_rec;
mod walker;

pub use areas::{AreaKind, AreaRegistry, MemArea, PRIM_MODE_UNSET};
pub use opcode::ControlOp;
pub use report::{DecodeIssue, FieldValue, Record, RecordBody, RecordSink};
pub use shader_rec::{shader_rec_size, SHADER_REC_ATTR_SIZE, SHADER_REC_FIXED_SIZE};
pub use walker::{TileBufferFlags, WalkError, Walker};
