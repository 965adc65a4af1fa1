use crate::HangDumpError;

/// Size of the on-disk hang-state header record.
///
/// The capture utility writes the kernel's hang-state struct verbatim: an
/// opaque `u64` userspace pointer, 22 register words, and 16 words of
/// padding.
pub const HANG_STATE_SIZE: usize = 8 + 22 * 4 + 16 * 4;

/// Size of one on-disk buffer-object descriptor (handle, paddr, size).
pub const BO_DESCRIPTOR_SIZE: usize = 12;

const SUPPORTED_VERSION: u32 = 0;

/// Hardware state registers captured at the moment of the hang.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HangState {
    pub bo_count: u32,
    /// Bin and render control-list bounds as submitted.
    pub start_bin: u32,
    pub start_render: u32,
    /// Control-thread 0 (binner) current/end addresses.
    pub ct0ca: u32,
    pub ct0ea: u32,
    /// Control-thread 1 (renderer) current/end addresses.
    pub ct1ca: u32,
    pub ct1ea: u32,
    pub ct0cs: u32,
    pub ct1cs: u32,
    pub ct0ra0: u32,
    pub ct1ra0: u32,
    /// Binner memory pool current address/size.
    pub bpca: u32,
    pub bpcs: u32,
    /// Binner memory pool overflow address/size.
    pub bpoa: u32,
    pub bpos: u32,
    pub vpmbase: u32,
    pub dbge: u32,
    pub fdbgo: u32,
    pub fdbgb: u32,
    pub fdbgr: u32,
    pub fdbgs: u32,
    pub errstat: u32,
}

/// One captured buffer object: a contiguous range of GPU-addressable memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferObject<'a> {
    pub handle: u32,
    /// Physical base address of the buffer in the GPU address space.
    pub paddr: u32,
    pub contents: &'a [u8],
}

impl BufferObject<'_> {
    pub fn size(&self) -> u32 {
        self.contents.len() as u32
    }

    /// End address (exclusive) of the buffer in the GPU address space.
    ///
    /// Saturating: a descriptor whose base + size wraps the 32-bit address
    /// space is clipped rather than wrapped.
    pub fn end_paddr(&self) -> u32 {
        self.paddr.saturating_add(self.size())
    }
}

/// A parsed hang dump: register state plus every captured buffer, borrowing
/// the input bytes. Immutable once loaded.
#[derive(Debug, PartialEq, Eq)]
pub struct HangDump<'a> {
    pub state: HangState,
    pub bos: Vec<BufferObject<'a>>,
}

impl<'a> HangDump<'a> {
    /// Parse a hang dump container.
    ///
    /// Only layout version 0 is accepted. Any truncation while reading the
    /// header, the descriptor array, or the buffer contents is fatal; there
    /// is no partially-recovered dump.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, HangDumpError> {
        let mut r = Reader { bytes, pos: 0 };

        let version = r.u32("version tag")?;
        if version != SUPPORTED_VERSION {
            return Err(HangDumpError::UnsupportedVersion(version));
        }

        let state = parse_state(&mut r)?;

        // Descriptor array, then the concatenated contents in the same order.
        let mut descs = Vec::with_capacity(state.bo_count.min(1024) as usize);
        for _ in 0..state.bo_count {
            let handle = r.u32("bo descriptor")?;
            let paddr = r.u32("bo descriptor")?;
            let size = r.u32("bo descriptor")?;
            descs.push((handle, paddr, size));
        }

        let mut bos = Vec::with_capacity(descs.len());
        for (handle, paddr, size) in descs {
            let contents = r.take(size as usize, "bo contents")?;
            bos.push(BufferObject {
                handle,
                paddr,
                contents,
            });
        }

        Ok(HangDump { state, bos })
    }
}

fn parse_state(r: &mut Reader<'_>) -> Result<HangState, HangDumpError> {
    let header = r.take(HANG_STATE_SIZE, "hang state header")?;
    let word = |i: usize| u32::from_le_bytes(header[8 + i * 4..12 + i * 4].try_into().unwrap());

    // header[0..8] is the ioctl's userspace pointer; it carries nothing for
    // decoding. The 16 trailing pad words are likewise skipped.
    Ok(HangState {
        bo_count: word(0),
        start_bin: word(1),
        start_render: word(2),
        ct0ca: word(3),
        ct0ea: word(4),
        ct1ca: word(5),
        ct1ea: word(6),
        ct0cs: word(7),
        ct1cs: word(8),
        ct0ra0: word(9),
        ct1ra0: word(10),
        bpca: word(11),
        bpcs: word(12),
        bpoa: word(13),
        bpos: word(14),
        vpmbase: word(15),
        dbge: word(16),
        fdbgo: word(17),
        fdbgb: word(18),
        fdbgr: word(19),
        fdbgs: word(20),
        errstat: word(21),
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], HangDumpError> {
        let available = self.bytes.len() - self.pos;
        if n > available {
            return Err(HangDumpError::Truncated {
                what,
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, HangDumpError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }
}
