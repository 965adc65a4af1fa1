//! End-to-end walk over a synthetic hang dump container.

use v3d_cl::{AreaKind, DecodeIssue, Record, RecordBody, Walker};
use v3d_hang::HangDump;

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn build_dump(start_bin: u32, ct0ea: u32, bos: &[(u32, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0); // version
    push_u32(&mut out, 0); // bo pointer (low)
    push_u32(&mut out, 0); // bo pointer (high)
    push_u32(&mut out, bos.len() as u32);
    push_u32(&mut out, start_bin);
    push_u32(&mut out, 0); // start_render
    push_u32(&mut out, 0); // ct0ca
    push_u32(&mut out, ct0ea);
    for _ in 0..17 + 16 {
        push_u32(&mut out, 0); // remaining registers + pad
    }
    for (i, (paddr, contents)) in bos.iter().enumerate() {
        push_u32(&mut out, i as u32 + 1);
        push_u32(&mut out, *paddr);
        push_u32(&mut out, contents.len() as u32);
    }
    for (_, contents) in bos {
        out.extend_from_slice(contents);
    }
    out
}

fn area_headers(recs: &[Record]) -> Vec<(AreaKind, u32)> {
    recs.iter()
        .filter_map(|r| match r.body {
            RecordBody::AreaHeader { kind, .. } => Some((kind, r.paddr)),
            _ => None,
        })
        .collect()
}

#[test]
fn sub_list_branched_to_twice_is_walked_exactly_once() {
    // Bin list in buffer 1 branches twice to the same target in buffer 2.
    let mut bin = vec![17u8];
    bin.extend_from_slice(&0x2000u32.to_le_bytes());
    bin.push(17);
    bin.extend_from_slice(&0x2000u32.to_le_bytes());
    bin.push(0); // HALT

    let sub = [1u8, 1, 18]; // NOP NOP RETURN_FROM_SUB_LIST

    let bytes = build_dump(
        0x1000,
        0x1000 + bin.len() as u32,
        &[(0x1000, &bin), (0x2000, &sub)],
    );
    let dump = HangDump::parse(&bytes).unwrap();
    assert_eq!(dump.state.start_bin, 0x1000);

    let mut walker = Walker::new(&dump, Vec::<Record>::new());
    walker
        .walk_list(dump.state.start_bin, dump.state.ct0ea, false)
        .unwrap();
    walker.walk_areas().unwrap();

    assert_eq!(walker.areas().len(), 1);
    let area = *walker.areas().get(0).unwrap();
    assert_eq!(area.kind, AreaKind::SubList);
    assert_eq!(area.paddr, 0x2000);
    assert_eq!(area.size, sub.len() as u32);

    let recs = walker.into_sink();
    assert_eq!(area_headers(&recs), vec![(AreaKind::SubList, 0x2000)]);

    // The sub-list body was decoded (exactly once).
    let sub_packets: Vec<&str> = recs
        .iter()
        .filter(|r| (0x2000..0x2003).contains(&r.paddr))
        .filter_map(|r| match r.body {
            RecordBody::Packet { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(sub_packets, vec!["NOP", "NOP", "RETURN_FROM_SUB_LIST"]);
}

#[test]
fn compressed_continuation_is_reached_through_the_second_pass() {
    // Render list: set triangle mode, enter a compressed run whose branch
    // jumps to a continuation block inside the same buffer.
    let mut render = vec![56u8, 0x12, 48];
    render.extend_from_slice(&[0x82, 0x02, 0x00]); // branch byte at 0x5003 -> 0x5040
    let mut buf = vec![0u8; 0x60];
    buf[..render.len()].copy_from_slice(&render);
    buf[0x40] = 0x04; // one relative index record
    buf[0x41] = 0x80; // escape

    let bytes = build_dump(0, 0, &[(0x5000, &buf)]);
    let dump = HangDump::parse(&bytes).unwrap();

    let mut walker = Walker::new(&dump, Vec::<Record>::new());
    walker.walk_list(0x5000, 0x5000 + buf.len() as u32, true).unwrap();
    walker.walk_areas().unwrap();

    assert_eq!(
        walker
            .areas()
            .all()
            .iter()
            .map(|a| (a.kind, a.paddr, a.prim_mode))
            .collect::<Vec<_>>(),
        vec![(AreaKind::CompressedPrimList, 0x5040, 0x12)]
    );

    let recs = walker.into_sink();
    assert!(recs
        .iter()
        .any(|r| r.paddr == 0x5040 && r.body == RecordBody::PrimRelIndex { rel: 1 }));
    assert!(recs
        .iter()
        .any(|r| r.paddr == 0x5041 && r.body == RecordBody::CompressedEscape));
    assert!(!recs
        .iter()
        .any(|r| matches!(r.body, RecordBody::Issue(_))));
}

#[test]
fn run_survives_a_reference_outside_the_captured_window() {
    // Shader state pointing into memory that was not captured: reported,
    // the rest of the list still decodes, and no area is registered.
    let mut bin = vec![64u8];
    bin.extend_from_slice(&(0x7000_0000u32 | 1).to_le_bytes());
    bin.push(1);
    bin.push(0);

    let bytes = build_dump(0x1000, 0x1000 + bin.len() as u32, &[(0x1000, &bin)]);
    let dump = HangDump::parse(&bytes).unwrap();

    let mut walker = Walker::new(&dump, Vec::<Record>::new());
    walker
        .walk_list(dump.state.start_bin, dump.state.ct0ea, false)
        .unwrap();
    walker.walk_areas().unwrap();

    assert!(walker.areas().is_empty());
    let recs = walker.into_sink();
    assert!(recs.iter().any(|r| r.body
        == RecordBody::Issue(DecodeIssue::UnresolvedAddress { paddr: 0x7000_0000 })));
    let names: Vec<&str> = recs
        .iter()
        .filter_map(|r| match r.body {
            RecordBody::Packet { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["GL_SHADER_STATE", "NOP", "HALT"]);
}
