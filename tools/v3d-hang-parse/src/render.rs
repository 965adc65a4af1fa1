//! Text rendering for decode records. The line layout here is for humans;
//! the decoded structure lives in `v3d-cl`.

use v3d_cl::{DecodeIssue, FieldValue, Record, RecordBody, TileBufferFlags, PRIM_MODE_UNSET};

pub fn line(rec: &Record) -> String {
    let paddr = rec.paddr;
    match &rec.body {
        RecordBody::ListHeader { label, start, end } => {
            format!("\n{label} CL at 0x{start:08x} to 0x{end:08x}")
        }
        RecordBody::AreaHeader { kind, size, prim_mode } => {
            let mode = if *prim_mode == PRIM_MODE_UNSET {
                String::new()
            } else {
                format!(", prim mode 0x{prim_mode:02x}")
            };
            format!("\n{} at 0x{paddr:08x} ({size} bytes{mode}):", kind.name())
        }
        RecordBody::Packet { opcode, name } => {
            format!("0x{paddr:08x}: 0x{opcode:02x} {name}")
        }
        RecordBody::RawByte { value } => format!("0x{paddr:08x}: 0x{value:02x}"),
        RecordBody::Field { name, value } => {
            format!("0x{paddr:08x}:      {name} {}", field_value(*name, *value))
        }
        RecordBody::PrimIndices { indices } => {
            format!(
                "0x{paddr:08x}:      indices {} {} {}",
                indices[0], indices[1], indices[2]
            )
        }
        RecordBody::PrimMixedIndices { absolute, rel } => {
            format!(
                "0x{paddr:08x}:      index {absolute} rel {} {}",
                rel[0], rel[1]
            )
        }
        RecordBody::PrimRelIndices { rel } => {
            format!(
                "0x{paddr:08x}:      rel indices {} {} {}",
                rel[0], rel[1], rel[2]
            )
        }
        RecordBody::PrimRelIndex { rel } => format!("0x{paddr:08x}:      rel index {rel}"),
        RecordBody::CompressedEscape => format!("0x{paddr:08x}:      escape"),
        RecordBody::CompressedBranch { target } => {
            format!("0x{paddr:08x}:      branch to 0x{target:08x}")
        }
        RecordBody::Instr { raw: _, text } => format!("0x{paddr:08x}: {text}"),
        RecordBody::Issue(issue) => issue_line(paddr, *issue),
    }
}

fn field_value(name: &str, value: FieldValue) -> String {
    match value {
        FieldValue::U8(v) => format!("{v}"),
        FieldValue::U16(v) => format!("{v}"),
        FieldValue::U32(v) if name == "flags" => {
            format!("{:?}", TileBufferFlags::from_bits_truncate(v))
        }
        FieldValue::U32(v) => format!("0x{v:08x}"),
        FieldValue::F32(v) => format!("{v}"),
        FieldValue::Addr(v) => format!("0x{v:08x}"),
        FieldValue::Str(v) => v.to_string(),
    }
}

fn issue_line(paddr: u32, issue: DecodeIssue) -> String {
    match issue {
        DecodeIssue::UnknownOpcode { opcode } => {
            format!("0x{paddr:08x}: unknown packet 0x{opcode:02x} ({opcode})!")
        }
        DecodeIssue::Overflow { needed } => {
            format!("0x{paddr:08x}: CL overflow ({needed} bytes needed)!")
        }
        DecodeIssue::UnresolvedAddress { paddr: target } => {
            format!("0x{paddr:08x}: no captured buffer contains 0x{target:08x}")
        }
        DecodeIssue::UnsupportedPrimMode { prim_mode } => {
            format!("0x{paddr:08x}: compressed primitives in unsupported prim mode 0x{prim_mode:02x}")
        }
        DecodeIssue::MissingProgramEnd => {
            format!("0x{paddr:08x}: no program end signal before end of buffer")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_lines_carry_address_and_name() {
        let rec = Record {
            paddr: 0x1000,
            body: RecordBody::Packet { opcode: 0, name: "HALT" },
        };
        assert_eq!(line(&rec), "0x00001000: 0x00 HALT");
    }

    #[test]
    fn flag_fields_render_symbolically() {
        let rec = Record {
            paddr: 0x1002,
            body: RecordBody::Field {
                name: "flags",
                value: FieldValue::U32(TileBufferFlags::EOF.bits()),
            },
        };
        assert!(line(&rec).contains("EOF"));
    }
}
