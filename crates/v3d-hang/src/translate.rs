use core::fmt::Write as _;

use crate::{BufferObject, HangDump};

/// A physical address resolved to its owning buffer and in-buffer offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Index into [`HangDump::bos`].
    pub bo: usize,
    pub offset: u32,
}

/// Bidirectional mapping between GPU physical addresses and captured buffer
/// bytes. Holds a read-only view of the dump; all cross-buffer references in
/// the decoder go through here rather than through raw offset arithmetic, so
/// a reference can never escape a buffer's captured extent.
#[derive(Clone, Copy)]
pub struct AddrMap<'a> {
    dump: &'a HangDump<'a>,
}

impl<'a> AddrMap<'a> {
    pub fn new(dump: &'a HangDump<'a>) -> Self {
        AddrMap { dump }
    }

    fn bo_containing(&self, paddr: u32) -> Option<(usize, &'a BufferObject<'a>)> {
        self.dump
            .bos
            .iter()
            .enumerate()
            .find(|(_, bo)| paddr.wrapping_sub(bo.paddr) < bo.size())
    }

    /// Resolve a physical address to its owning buffer, or `None` when the
    /// address falls outside every captured buffer.
    pub fn to_location(&self, paddr: u32) -> Option<Location> {
        let (bo, b) = self.bo_containing(paddr)?;
        Some(Location {
            bo,
            offset: paddr - b.paddr,
        })
    }

    /// Inverse of [`AddrMap::to_location`].
    pub fn to_paddr(&self, loc: Location) -> Option<u32> {
        let bo = self.dump.bos.get(loc.bo)?;
        if loc.offset >= bo.size() {
            return None;
        }
        Some(bo.paddr + loc.offset)
    }

    /// End address (exclusive) of the buffer containing `paddr`. Sizes a
    /// reference whose length is implicit ("runs to the end of its buffer").
    pub fn region_end(&self, paddr: u32) -> Option<u32> {
        let (_, bo) = self.bo_containing(paddr)?;
        Some(bo.end_paddr())
    }

    /// The captured bytes from `paddr` to the end of its owning buffer.
    pub fn slice_from(&self, paddr: u32) -> Option<&'a [u8]> {
        let (_, bo) = self.bo_containing(paddr)?;
        Some(&bo.contents[(paddr - bo.paddr) as usize..])
    }

    /// One line per captured buffer range, for diagnostics when an address
    /// cannot be resolved.
    pub fn describe_ranges(&self) -> String {
        let mut out = String::new();
        for bo in &self.dump.bos {
            let _ = writeln!(
                out,
                "0x{:08x}..0x{:08x} (handle {}, {} bytes)",
                bo.paddr,
                bo.end_paddr(),
                bo.handle,
                bo.size()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::build_dump;

    #[test]
    fn resolves_addresses_inside_buffers() {
        let bytes = build_dump(&[(0x1000, &[1, 2, 3, 4]), (0x2000, &[5, 6])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);

        assert_eq!(map.to_location(0x1000), Some(Location { bo: 0, offset: 0 }));
        assert_eq!(map.to_location(0x1003), Some(Location { bo: 0, offset: 3 }));
        assert_eq!(map.to_location(0x2001), Some(Location { bo: 1, offset: 1 }));

        // Half-open: the end address belongs to no buffer.
        assert_eq!(map.to_location(0x1004), None);
        assert_eq!(map.to_location(0x0fff), None);
        assert_eq!(map.to_location(0x3000), None);
    }

    #[test]
    fn round_trips_both_ways() {
        let bytes = build_dump(&[(0x1000, &[0; 16]), (0x8000, &[0; 4])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);

        for paddr in [0x1000, 0x100f, 0x8000, 0x8003] {
            let loc = map.to_location(paddr).unwrap();
            assert_eq!(map.to_paddr(loc), Some(paddr));
        }
        for loc in [Location { bo: 0, offset: 7 }, Location { bo: 1, offset: 0 }] {
            let paddr = map.to_paddr(loc).unwrap();
            assert_eq!(map.to_location(paddr), Some(loc));
        }
    }

    #[test]
    fn to_paddr_rejects_out_of_range_locations() {
        let bytes = build_dump(&[(0x1000, &[0; 4])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);
        assert_eq!(map.to_paddr(Location { bo: 0, offset: 4 }), None);
        assert_eq!(map.to_paddr(Location { bo: 1, offset: 0 }), None);
    }

    #[test]
    fn region_end_is_the_owning_buffer_end() {
        let bytes = build_dump(&[(0x1000, &[0; 16]), (0x8000, &[0; 4])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);
        assert_eq!(map.region_end(0x1000), Some(0x1010));
        assert_eq!(map.region_end(0x100f), Some(0x1010));
        assert_eq!(map.region_end(0x8002), Some(0x8004));
        assert_eq!(map.region_end(0x1010), None);
    }

    #[test]
    fn slice_from_runs_to_buffer_end() {
        let bytes = build_dump(&[(0x1000, &[10, 11, 12, 13])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);
        assert_eq!(map.slice_from(0x1001), Some(&[11, 12, 13][..]));
        assert_eq!(map.slice_from(0x2000), None);
    }

    #[test]
    fn zero_sized_buffers_own_no_addresses() {
        let bytes = build_dump(&[(0x1000, &[]), (0x1000, &[42])]);
        let dump = HangDump::parse(&bytes).unwrap();
        let map = AddrMap::new(&dump);
        // The zero-sized descriptor at the same base never matches.
        assert_eq!(map.to_location(0x1000), Some(Location { bo: 1, offset: 0 }));
    }
}
