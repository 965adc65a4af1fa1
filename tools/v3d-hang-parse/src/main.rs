use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use v3d_cl::{Record, RecordSink, Walker};
use v3d_hang::{HangDump, HangState};

mod render;

#[derive(Parser, Debug)]
#[command(
    name = "v3d-hang-parse",
    about = "Decode a captured V3D hang dump back into its command lists, sub-lists and shader records."
)]
struct Args {
    /// Input hang dump file
    input: PathBuf,

    /// Print the captured hardware registers and stop
    #[arg(long, action = clap::ArgAction::SetTrue)]
    registers_only: bool,

    /// Skip the second pass over discovered memory areas
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_sublists: bool,

    /// Suppress stderr diagnostics
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    quiet: bool,
}

/// Renders each record to stdout as it is decoded.
struct TextSink;

impl RecordSink for TextSink {
    fn record(&mut self, rec: Record) {
        println!("{}", render::line(&rec));
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let dump = HangDump::parse(&bytes).context("parse hang dump")?;

    print_registers(&dump.state);
    if args.registers_only {
        return Ok(());
    }

    let state = dump.state;
    let mut walker = Walker::new(&dump, TextSink);

    // An empty bin list leaves CT0 parked at its end address.
    if state.start_bin != state.ct0ea {
        walker
            .walk_list(state.start_bin, state.ct0ea, false)
            .context("walk bin command list")?;
    }
    walker
        .walk_list(state.start_render, state.ct1ea, true)
        .context("walk render command list")?;

    if !args.no_sublists {
        walker
            .walk_areas()
            .context("walk discovered memory areas")?;
    }
    Ok(())
}

fn print_registers(state: &HangState) {
    println!(
        "Bin CL:         0x{:08x} to 0x{:08x}",
        state.start_bin, state.ct0ea
    );
    println!("Bin current:    0x{:08x}", state.ct0ca);
    println!(
        "Render CL:      0x{:08x} to 0x{:08x}",
        state.start_render, state.ct1ea
    );
    println!("Render current: 0x{:08x}", state.ct1ca);
    println!();
    println!("V3D_VPMBASE:    0x{:08x}", state.vpmbase);
    println!("V3D_DBGE:       0x{:08x}", state.dbge);
    println!("V3D_FDBGO:      0x{:08x}", state.fdbgo);
    println!("V3D_FDBGB:      0x{:08x}", state.fdbgb);
    println!("V3D_FDBGR:      0x{:08x}", state.fdbgr);
    println!("V3D_FDBGS:      0x{:08x}", state.fdbgs);
    println!("V3D_ERRSTAT:    0x{:08x}", state.errstat);
    println!();
}
