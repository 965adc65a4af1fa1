use proptest::prelude::*;

use v3d_hang::{AddrMap, HangDump, Location};

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn build_dump(bos: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0); // version
    push_u32(&mut out, 0); // bo pointer (low)
    push_u32(&mut out, 0); // bo pointer (high)
    push_u32(&mut out, bos.len() as u32);
    for _ in 0..21 + 16 {
        push_u32(&mut out, 0);
    }
    for (i, (paddr, size)) in bos.iter().enumerate() {
        push_u32(&mut out, i as u32);
        push_u32(&mut out, *paddr);
        push_u32(&mut out, *size);
    }
    for (_, size) in bos {
        out.extend(std::iter::repeat(0u8).take(*size as usize));
    }
    out
}

// Disjoint-by-construction buffer layouts: (gap, size) pairs accumulated from
// a random base, with at least one byte of gap between buffers.
fn layouts() -> impl Strategy<Value = Vec<(u32, u32)>> {
    (0u32..0x1000_0000, prop::collection::vec((1u32..0x100, 1u32..0x80), 1..6)).prop_map(
        |(base, steps)| {
            let mut next = base;
            let mut out = Vec::new();
            for (gap, size) in steps {
                next += gap;
                out.push((next, size));
                next += size;
            }
            out
        },
    )
}

proptest! {
    #[test]
    fn paddr_location_round_trip(bos in layouts()) {
        let bytes = build_dump(&bos);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);

        for (i, (paddr, size)) in bos.iter().enumerate() {
            for addr in [*paddr, paddr + size / 2, paddr + size - 1] {
                let loc = map.to_location(addr).unwrap();
                prop_assert_eq!(loc.bo, i);
                prop_assert_eq!(map.to_paddr(loc), Some(addr));
                prop_assert_eq!(map.region_end(addr), Some(paddr + size));
            }
            let loc = Location { bo: i, offset: size - 1 };
            let addr = map.to_paddr(loc).unwrap();
            prop_assert_eq!(map.to_location(addr), Some(loc));
        }
    }

    #[test]
    fn gap_addresses_do_not_resolve(bos in layouts()) {
        let bytes = build_dump(&bos);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);

        // Layouts always leave at least one byte of gap on both sides of a
        // buffer, so its neighbours resolve to nothing.
        for (paddr, size) in &bos {
            prop_assert_eq!(map.to_location(paddr - 1), None);
            prop_assert_eq!(map.region_end(paddr - 1), None);
            prop_assert_eq!(map.to_location(paddr + size), None);
        }
    }
}
