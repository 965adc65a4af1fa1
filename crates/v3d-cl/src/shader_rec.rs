//! GL shader-record decoding: the per-draw record holding the three shader
//! stages' code and uniform pointers plus the vertex attribute setup.

use crate::areas::{AreaKind, MemArea, PRIM_MODE_UNSET};
use crate::report::{DecodeIssue, FieldValue, RecordSink};
use crate::walker::{WalkError, Walker};

/// Fixed part of the record; each attribute appends one 8-byte descriptor.
pub const SHADER_REC_FIXED_SIZE: u32 = 36;
pub const SHADER_REC_ATTR_SIZE: u32 = 8;

pub fn shader_rec_size(attribute_count: u8) -> u32 {
    SHADER_REC_FIXED_SIZE + attribute_count as u32 * SHADER_REC_ATTR_SIZE
}

impl<S: RecordSink> Walker<'_, S> {
    pub(crate) fn walk_shader_record(&mut self, area: &MemArea) -> Result<(), WalkError> {
        if area.extended {
            return Err(WalkError::ExtendedShaderRecord { paddr: area.paddr });
        }
        let Some(bytes) = self.resolve(area.paddr, area.paddr) else {
            return Ok(());
        };
        if (bytes.len() as u32) < area.size {
            self.issue(area.paddr, DecodeIssue::Overflow { needed: area.size });
            return Ok(());
        }
        let rec = &bytes[..area.size as usize];
        let base = area.paddr;
        let u8_at = |at: usize| rec[at];
        let u16_at = |at: usize| u16::from_le_bytes(rec[at..at + 2].try_into().unwrap());
        let u32_at = |at: usize| u32::from_le_bytes(rec[at..at + 4].try_into().unwrap());

        self.field(base, "flags", FieldValue::U16(u16_at(0)));

        self.field(base + 2, "fs_num_uniforms", FieldValue::U8(u8_at(2)));
        self.field(base + 3, "fs_num_inputs", FieldValue::U8(u8_at(3)));
        let fs_code = u32_at(4);
        self.field(base + 4, "fs_code", FieldValue::Addr(fs_code));
        self.field(base + 8, "fs_uniforms", FieldValue::Addr(u32_at(8)));

        self.field(base + 12, "vs_num_uniforms", FieldValue::U16(u16_at(12)));
        self.field(base + 14, "vs_attr_mask", FieldValue::U8(u8_at(14)));
        self.field(base + 15, "vs_attr_size", FieldValue::U8(u8_at(15)));
        let vs_code = u32_at(16);
        self.field(base + 16, "vs_code", FieldValue::Addr(vs_code));
        self.field(base + 20, "vs_uniforms", FieldValue::Addr(u32_at(20)));

        self.field(base + 24, "cs_num_uniforms", FieldValue::U16(u16_at(24)));
        self.field(base + 26, "cs_attr_mask", FieldValue::U8(u8_at(26)));
        self.field(base + 27, "cs_attr_size", FieldValue::U8(u8_at(27)));
        let cs_code = u32_at(28);
        self.field(base + 28, "cs_code", FieldValue::Addr(cs_code));
        self.field(base + 32, "cs_uniforms", FieldValue::Addr(u32_at(32)));

        for (kind, code_addr) in [
            (AreaKind::FragmentShaderCode, fs_code),
            (AreaKind::VertexShaderCode, vs_code),
            (AreaKind::CoordShaderCode, cs_code),
        ] {
            self.register_shader_code(kind, code_addr);
        }

        for i in 0..area.attribute_count as usize {
            let at = 36 + i * 8;
            let paddr = base + at as u32;
            self.field(paddr, "attr_base", FieldValue::Addr(u32_at(at)));
            self.field(paddr + 4, "attr_size", FieldValue::U8(u8_at(at + 4).wrapping_add(1)));
            self.field(paddr + 5, "attr_stride", FieldValue::U8(u8_at(at + 5)));
            self.field(paddr + 6, "attr_vs_offset", FieldValue::U8(u8_at(at + 6)));
            self.field(paddr + 7, "attr_cs_offset", FieldValue::U8(u8_at(at + 7)));
        }
        Ok(())
    }

    /// Size a stage's code by scanning forward for the program-end signal;
    /// without one the area runs to the end of its buffer and the missing
    /// terminator is reported.
    fn register_shader_code(&mut self, kind: AreaKind, code_addr: u32) {
        let Some(bytes) = self.resolve(code_addr, code_addr) else {
            return;
        };
        let size = match v3d_qpu::program_len(bytes) {
            Some(len) => len as u32,
            None => {
                self.issue(code_addr, DecodeIssue::MissingProgramEnd);
                bytes.len() as u32
            }
        };
        self.add_sized(
            MemArea {
                kind,
                paddr: code_addr,
                size,
                prim_mode: PRIM_MODE_UNSET,
                attribute_count: 0,
                extended: false,
            },
            code_addr,
        );
    }
}
