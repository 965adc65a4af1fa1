#![forbid(unsafe_code)]

//! QPU shader-instruction helpers for the V3D hang decoder.
//!
//! This crate intentionally stays dependency-free. It knows just enough about
//! the 64-bit QPU instruction word to find where a program ends (the
//! program-end signal plus its two delay slots) and to render an instruction
//! as a one-line string. Full operand decoding is out of scope; the raw
//! instruction words are always part of the rendered line so nothing is
//! hidden.

/// Size of one QPU instruction in bytes.
pub const INSTR_SIZE: usize = 8;

/// Instructions executed after a program-end signal before the thread stops.
pub const DELAY_SLOTS: usize = 2;

/// The signal field occupies the top four bits of the instruction word.
pub const SIG_PROG_END: u8 = 3;
pub const SIG_SMALL_IMM: u8 = 13;
pub const SIG_LOAD_IMM: u8 = 14;
pub const SIG_BRANCH: u8 = 15;

/// Extract the signal field (bits 60..64).
pub fn signal(inst: u64) -> u8 {
    (inst >> 60) as u8
}

pub fn signal_name(sig: u8) -> &'static str {
    match sig {
        0 => "breakpoint",
        1 => "nosig",
        2 => "thrsw",
        3 => "prog_end",
        4 => "wait_score",
        5 => "unlock_score",
        6 => "last_thrsw",
        7 => "load_cv",
        8 => "load_c",
        9 => "load_c_end",
        10 => "load_tmu0",
        11 => "load_tmu1",
        12 => "load_am",
        13 => "small_imm",
        14 => "load_imm",
        15 => "branch",
        _ => "?",
    }
}

/// Scan forward from the start of `bytes` for the end of a QPU program.
///
/// Returns the program length in bytes: everything up to and including the
/// instruction carrying [`SIG_PROG_END`], plus the two delay-slot
/// instructions that execute after it (clipped to the available bytes).
/// Returns `None` when no program-end signal occurs in `bytes`.
pub fn program_len(bytes: &[u8]) -> Option<usize> {
    for (i, word) in bytes.chunks_exact(INSTR_SIZE).enumerate() {
        let inst = u64::from_le_bytes(word.try_into().unwrap());
        if signal(inst) == SIG_PROG_END {
            let full = (i + 1 + DELAY_SLOTS) * INSTR_SIZE;
            let avail = bytes.len() - bytes.len() % INSTR_SIZE;
            return Some(full.min(avail));
        }
    }
    None
}

/// Render one instruction as a single line.
pub fn disasm(inst: u64) -> String {
    let sig = signal(inst);
    match sig {
        SIG_LOAD_IMM => format!("load_imm 0x{:08x} ; 0x{inst:016x}", inst as u32),
        SIG_BRANCH => format!("branch rel 0x{:08x} ; 0x{inst:016x}", inst as u32),
        _ => format!("{:<12} ; 0x{inst:016x}", signal_name(sig)),
    }
}
