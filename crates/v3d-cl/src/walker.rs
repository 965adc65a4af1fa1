use thiserror::Error;
use tracing::warn;
use v3d_hang::{AddrMap, HangDump};

use crate::areas::{AreaKind, AreaRegistry, MemArea, PRIM_MODE_UNSET};
use crate::compressed::{decode_run, RunEnd};
use crate::opcode::ControlOp;
use crate::report::{DecodeIssue, FieldValue, Record, RecordBody, RecordSink};

bitflags::bitflags! {
    /// Flag bits in the low nibble of the store/load tile-buffer address
    /// word. In "full" buffer mode the disable bits select which planes are
    /// skipped; bit 3 signals end-of-frame on stores.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TileBufferFlags: u32 {
        const DISABLE_COLOR = 1 << 0;
        const DISABLE_ZS = 1 << 1;
        const DISABLE_VG_MASK = 1 << 2;
        const EOF = 1 << 3;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalkError {
    /// The extended shader-record layout is not implemented. Its field sizes
    /// differ from the plain record, so guessing would mis-decode everything
    /// after it; the run aborts instead.
    #[error("extended shader record at 0x{paddr:08x} is not supported")]
    ExtendedShaderRecord { paddr: u32 },
}

/// The decode engine: walks command-list byte ranges, resolving addresses
/// through the translator and collecting newly discovered regions in the
/// area registry for the second pass.
///
/// One walker is built per run and threaded through every decode call; it is
/// the only mutable state in the pipeline.
pub struct Walker<'a, S> {
    map: AddrMap<'a>,
    areas: AreaRegistry,
    sink: S,
}

impl<'a, S: RecordSink> Walker<'a, S> {
    pub fn new(dump: &'a HangDump<'a>, sink: S) -> Self {
        Walker {
            map: AddrMap::new(dump),
            areas: AreaRegistry::new(),
            sink,
        }
    }

    pub fn areas(&self) -> &AreaRegistry {
        &self.areas
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Walk a top-level command list over `[start, end)`.
    pub fn walk_list(&mut self, start: u32, end: u32, is_render: bool) -> Result<(), WalkError> {
        let label = if is_render { "render" } else { "bin" };
        self.emit(start, RecordBody::ListHeader { label, start, end });
        self.walk_fixed(start, end, PRIM_MODE_UNSET)
    }

    /// Walk every registered area, including areas registered while this
    /// loop runs: the registry is append-only, so a plain index walk reaches
    /// all transitively discovered regions, and dedup bounds the loop.
    pub fn walk_areas(&mut self) -> Result<(), WalkError> {
        let mut i = 0;
        while i < self.areas.len() {
            let area = *self.areas.get(i).expect("index bounded by len");
            self.walk_area(&area)?;
            i += 1;
        }
        Ok(())
    }

    pub fn walk_area(&mut self, area: &MemArea) -> Result<(), WalkError> {
        self.emit(
            area.paddr,
            RecordBody::AreaHeader {
                kind: area.kind,
                size: area.size,
                prim_mode: area.prim_mode,
            },
        );
        let end = area.paddr.saturating_add(area.size);
        match area.kind {
            AreaKind::SubList => self.walk_fixed(area.paddr, end, area.prim_mode),
            AreaKind::CompressedPrimList => {
                self.walk_compressed_region(area.paddr, end, area.prim_mode);
                Ok(())
            }
            AreaKind::ShaderRecord => self.walk_shader_record(area),
            AreaKind::VertexShaderCode
            | AreaKind::CoordShaderCode
            | AreaKind::FragmentShaderCode => {
                self.walk_code(area.paddr, area.size);
                Ok(())
            }
        }
    }

    /// Fixed-opcode mode over `[start, end)`, clipped to the captured extent
    /// of the buffer owning `start`.
    fn walk_fixed(&mut self, start: u32, end: u32, prim_mode: u8) -> Result<(), WalkError> {
        if end <= start {
            return Ok(());
        }
        let Some(bytes) = self.resolve(start, start) else {
            return Ok(());
        };
        let len = (end - start).min(bytes.len() as u32) as usize;
        let bytes = &bytes[..len];

        let mut prim_mode = prim_mode;
        let mut pos = 0usize;
        while pos < len {
            let paddr = start + pos as u32;
            let head = bytes[pos];
            let Some(op) = ControlOp::from_u8(head) else {
                warn!("unknown opcode 0x{head:02x} at 0x{paddr:08x}");
                self.issue(paddr, DecodeIssue::UnknownOpcode { opcode: head });
                return Ok(());
            };
            self.emit(paddr, RecordBody::Packet { opcode: head, name: op.name() });

            let consumed = match op.fixed_size() {
                Some(size) => {
                    let size = size as usize;
                    if pos + size > len {
                        self.issue(paddr, DecodeIssue::Overflow { needed: size as u32 });
                        return Ok(());
                    }
                    self.decode_fields(op, paddr, &bytes[pos + 1..pos + size], &mut prim_mode)?;
                    size
                }
                None => {
                    // Compressed-primitive packet: length comes from the
                    // sub-grammar; a branch inside it ends this list.
                    match self.decode_compressed_packet(op, paddr, &bytes[pos..], prim_mode) {
                        Some(n) => n,
                        None => return Ok(()),
                    }
                }
            };

            if op.is_terminal() {
                return Ok(());
            }
            pos += consumed;
        }
        Ok(())
    }

    /// Decode one COMPRESSED_PRIMITIVE / CLIPPED_COMPRESSED_PRIMITIVE
    /// packet starting at `bytes[0]`. Returns the consumed length, or `None`
    /// when decoding of the current list must stop (branch taken, overflow,
    /// unusable primitive mode).
    fn decode_compressed_packet(
        &mut self,
        op: ControlOp,
        paddr: u32,
        bytes: &[u8],
        prim_mode: u8,
    ) -> Option<usize> {
        if !is_compressed_triangle_mode(prim_mode) {
            self.issue(paddr, DecodeIssue::UnsupportedPrimMode { prim_mode });
            return None;
        }

        let mut header = 1usize;
        if op == ControlOp::ClippedCompressedPrimitive {
            // Clip header: flags/address word between the opcode and the
            // index records.
            header = 5;
            let Some(word) = bytes.get(1..5) else {
                self.issue(paddr, DecodeIssue::Overflow { needed: 5 });
                return None;
            };
            let clip = u32::from_le_bytes(word.try_into().unwrap());
            self.emit(
                paddr + 1,
                RecordBody::Field { name: "clip", value: FieldValue::Addr(clip) },
            );
        }

        match decode_run(&bytes[header..], paddr + header as u32, &mut self.sink) {
            RunEnd::Escape { consumed } | RunEnd::End { consumed } => Some(header + consumed),
            RunEnd::Branch { consumed: _, target } => {
                self.add_unsized(AreaKind::CompressedPrimList, target, prim_mode, paddr);
                None
            }
            RunEnd::Overflow { at, needed } => {
                self.issue(
                    paddr + header as u32 + at as u32,
                    DecodeIssue::Overflow { needed: needed as u32 },
                );
                None
            }
        }
    }

    /// Walk a region that is entered mid-run (branched to), starting
    /// directly inside the compressed-primitive sub-grammar.
    fn walk_compressed_region(&mut self, start: u32, end: u32, prim_mode: u8) {
        if !is_compressed_triangle_mode(prim_mode) {
            self.issue(start, DecodeIssue::UnsupportedPrimMode { prim_mode });
            return;
        }
        if end <= start {
            return;
        }
        let Some(bytes) = self.resolve(start, start) else {
            return;
        };
        let len = (end - start).min(bytes.len() as u32) as usize;

        match decode_run(&bytes[..len], start, &mut self.sink) {
            // The escape hands control back to whichever fixed-mode list
            // branched here; the bytes after it are not this region's.
            RunEnd::Escape { .. } | RunEnd::End { .. } => {}
            RunEnd::Branch { consumed: _, target } => {
                self.add_unsized(AreaKind::CompressedPrimList, target, prim_mode, start);
            }
            RunEnd::Overflow { at, needed } => {
                self.issue(
                    start + at as u32,
                    DecodeIssue::Overflow { needed: needed as u32 },
                );
            }
        }
    }

    /// Walk a shader-code area as an instruction stream.
    fn walk_code(&mut self, start: u32, size: u32) {
        let Some(bytes) = self.resolve(start, start) else {
            return;
        };
        let len = size.min(bytes.len() as u32) as usize;
        for (i, word) in bytes[..len].chunks_exact(v3d_qpu::INSTR_SIZE).enumerate() {
            let raw = u64::from_le_bytes(word.try_into().unwrap());
            self.emit(
                start + (i * v3d_qpu::INSTR_SIZE) as u32,
                RecordBody::Instr { raw, text: v3d_qpu::disasm(raw) },
            );
        }
    }

    fn decode_fields(
        &mut self,
        op: ControlOp,
        paddr: u32,
        payload: &[u8],
        prim_mode: &mut u8,
    ) -> Result<(), WalkError> {
        let base = paddr + 1;
        match op {
            ControlOp::Branch => {
                self.field(base, "target", FieldValue::Addr(le32(payload, 0)));
            }
            ControlOp::BranchToSubList => {
                let target = le32(payload, 0);
                self.field(base, "target", FieldValue::Addr(target));
                self.add_unsized(AreaKind::SubList, target, *prim_mode, paddr);
            }
            ControlOp::StoreTileBufferGeneral | ControlOp::LoadTileBufferGeneral => {
                self.decode_tile_buffer_general(base, payload);
            }
            ControlOp::PrimitiveListFormat => {
                let mode = payload[0];
                *prim_mode = mode;
                self.field(base, "mode", FieldValue::U8(mode));
                self.field(base, "prim_type", FieldValue::Str(prim_type_name(mode)));
            }
            ControlOp::GlShaderState => {
                let word = le32(payload, 0);
                let attribute_count = match (word & 7) as u8 {
                    0 => 8,
                    n => n,
                };
                let extended = word & 8 != 0;
                let addr = word & !0xf;
                self.field(base, "addr", FieldValue::Addr(addr));
                self.field(base, "num_attributes", FieldValue::U8(attribute_count));
                if extended {
                    return Err(WalkError::ExtendedShaderRecord { paddr: addr });
                }
                let size = crate::shader_rec::shader_rec_size(attribute_count);
                self.add_sized(
                    MemArea {
                        kind: AreaKind::ShaderRecord,
                        paddr: addr,
                        size,
                        prim_mode: PRIM_MODE_UNSET,
                        attribute_count,
                        extended,
                    },
                    paddr,
                );
            }
            ControlOp::NvShaderState | ControlOp::VgShaderState => {
                self.field(base, "addr", FieldValue::Addr(le32(payload, 0)));
            }
            ControlOp::FlatShadeFlags => {
                self.field(base, "bits", FieldValue::U32(le32(payload, 0)));
            }
            ControlOp::PointSize => {
                self.field(base, "size", FieldValue::F32(lef32(payload, 0)));
            }
            ControlOp::LineWidth => {
                self.field(base, "width", FieldValue::F32(lef32(payload, 0)));
            }
            ControlOp::ViewportOffset => {
                // 1/16th-pixel units.
                self.field(base, "x", FieldValue::F32(le16(payload, 0) as f32 / 16.0));
                self.field(base + 2, "y", FieldValue::F32(le16(payload, 2) as f32 / 16.0));
            }
            ControlOp::ClipperXyScaling => {
                self.field(base, "x_scale", FieldValue::F32(lef32(payload, 0)));
                self.field(base + 4, "y_scale", FieldValue::F32(lef32(payload, 4)));
            }
            ControlOp::ClipperZScaling => {
                self.field(base, "z_scale", FieldValue::F32(lef32(payload, 0)));
                self.field(base + 4, "z_offset", FieldValue::F32(lef32(payload, 4)));
            }
            ControlOp::TileRenderingModeConfig => {
                self.decode_tile_rendering_config(base, payload);
            }
            ControlOp::TileCoordinates => {
                self.field(base, "x", FieldValue::U8(payload[0]));
                self.field(base + 1, "y", FieldValue::U8(payload[1]));
            }
            _ => {
                for (i, &b) in payload.iter().enumerate() {
                    self.emit(base + i as u32, RecordBody::RawByte { value: b });
                }
            }
        }
        Ok(())
    }

    fn decode_tile_buffer_general(&mut self, base: u32, payload: &[u8]) {
        let buffer = match payload[0] & 0x7 {
            0 => "none",
            1 => "color",
            2 => "zs",
            3 => "z",
            4 => "vgmask",
            5 => "full",
            _ => "???",
        };
        let tiling = match (payload[0] >> 4) & 0x7 {
            0 => "linear",
            1 => "T",
            2 => "LT",
            _ => "???",
        };
        let format = match payload[1] & 0x3 {
            0 => "RGBA8888",
            1 => "BGR565_DITHER",
            2 => "BGR565",
            _ => "???",
        };
        let word = le32(payload, 2);
        self.field(base, "buffer", FieldValue::Str(buffer));
        self.field(base, "tiling", FieldValue::Str(tiling));
        self.field(base + 1, "format", FieldValue::Str(format));
        self.field(base + 2, "addr", FieldValue::Addr(word & !0xf));
        self.field(
            base + 2,
            "flags",
            FieldValue::U32(TileBufferFlags::from_bits_truncate(word).bits()),
        );
    }

    fn decode_tile_rendering_config(&mut self, base: u32, payload: &[u8]) {
        self.field(base, "color_addr", FieldValue::Addr(le32(payload, 0)));
        self.field(base + 4, "width", FieldValue::U16(le16(payload, 4)));
        self.field(base + 6, "height", FieldValue::U16(le16(payload, 6)));
        let config = payload[8];
        let format = match (config >> 2) & 0x3 {
            0 => "BGR565_DITHERED",
            1 => "RGBA8888",
            2 => "BGR565",
            _ => "???",
        };
        let tiling = match (config >> 6) & 0x3 {
            0 => "linear",
            1 => "T",
            2 => "LT",
            _ => "???",
        };
        self.field(base + 8, "format", FieldValue::Str(format));
        self.field(base + 8, "tiling", FieldValue::Str(tiling));
        self.field(
            base + 8,
            "samples",
            FieldValue::Str(if config & 1 != 0 { "ms" } else { "ss" }),
        );
        let earlyz = payload[9];
        self.field(
            base + 9,
            "early_z",
            FieldValue::Str(if earlyz & (1 << 3) != 0 {
                "disabled"
            } else if earlyz & (1 << 2) != 0 {
                "greater"
            } else {
                "less"
            }),
        );
    }

    /// Register an area whose size runs to the end of its containing buffer.
    fn add_unsized(&mut self, kind: AreaKind, paddr: u32, prim_mode: u8, at: u32) {
        let Some(end) = self.map.region_end(paddr) else {
            self.report_unresolved(at, paddr);
            return;
        };
        self.areas.add(MemArea {
            kind,
            paddr,
            size: end - paddr,
            prim_mode,
            attribute_count: 0,
            extended: false,
        });
    }

    /// Register an explicitly sized area, verifying its address resolves.
    pub(crate) fn add_sized(&mut self, area: MemArea, at: u32) {
        if self.map.to_location(area.paddr).is_none() {
            self.report_unresolved(at, area.paddr);
            return;
        }
        self.areas.add(area);
    }

    /// Bytes from `paddr` to the end of its buffer, or a reported
    /// unresolved-address issue.
    pub(crate) fn resolve(&mut self, paddr: u32, at: u32) -> Option<&'a [u8]> {
        match self.map.slice_from(paddr) {
            Some(bytes) => Some(bytes),
            None => {
                self.report_unresolved(at, paddr);
                None
            }
        }
    }

    fn report_unresolved(&mut self, at: u32, paddr: u32) {
        warn!(
            "address 0x{paddr:08x} outside captured buffers; known ranges:\n{}",
            self.map.describe_ranges()
        );
        self.issue(at, DecodeIssue::UnresolvedAddress { paddr });
    }

    pub(crate) fn emit(&mut self, paddr: u32, body: RecordBody) {
        self.sink.record(Record { paddr, body });
    }

    pub(crate) fn field(&mut self, paddr: u32, name: &'static str, value: FieldValue) {
        self.emit(paddr, RecordBody::Field { name, value });
    }

    pub(crate) fn issue(&mut self, paddr: u32, issue: DecodeIssue) {
        self.emit(paddr, RecordBody::Issue(issue));
    }
}

/// The compressed encoding is only defined for triangle lists; everything
/// else (or an unset mode) cannot be decoded.
fn is_compressed_triangle_mode(prim_mode: u8) -> bool {
    prim_mode != PRIM_MODE_UNSET && prim_mode & 0xf == 2
}

fn prim_type_name(mode: u8) -> &'static str {
    match mode & 0xf {
        0 => "points",
        1 => "lines",
        2 => "triangles",
        3 => "rht",
        _ => "???",
    }
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn lef32(bytes: &[u8], at: usize) -> f32 {
    f32::from_bits(le32(bytes, at))
}
