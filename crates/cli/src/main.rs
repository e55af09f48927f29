//! MIPS-32 out-of-order simulator CLI.
//!
//! A single `run` subcommand: load a program image (and optional data
//! image), optionally override configuration from JSON, simulate until the
//! pipeline drains or the cycle cap is hit, then report final architectural
//! state and run statistics.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use mipssim_core::config::Config;
use mipssim_core::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "mipssim",
    author,
    version,
    about = "MIPS-32 out-of-order superscalar pipeline simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program image to completion (or until the cycle cap).
    Run {
        /// Flat program image, loaded at the configured start PC.
        program: PathBuf,

        /// Optional flat data image, loaded at the configured data base.
        #[arg(long)]
        data: Option<PathBuf>,

        /// JSON file overriding the default configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Hard cap on simulated cycles, overriding the config value.
        #[arg(long)]
        cycles: Option<u64>,

        /// Enable per-cycle tracing to stderr.
        #[arg(long)]
        trace: bool,

        /// Print a memory range after the run, as `<start>:<word_count>`
        /// (hex or decimal `start`, e.g. `0x1000:16`).
        #[arg(long)]
        dump_mem: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            program,
            data,
            config,
            cycles,
            trace,
            dump_mem,
        } => cmd_run(&program, data.as_deref(), config.as_deref(), cycles, trace, dump_mem.as_deref()),
    }
}

fn cmd_run(
    program: &std::path::Path,
    data: Option<&std::path::Path>,
    config_path: Option<&std::path::Path>,
    cycles: Option<u64>,
    trace: bool,
    dump_mem: Option<&str>,
) {
    let mut config = load_config(config_path);
    if trace {
        config.general.trace = true;
    }
    if let Some(cap) = cycles {
        config.general.max_cycles = cap;
    }

    let mut sim = Simulator::new(&config);

    if let Err(e) = sim.load_program(program, config.general.start_pc) {
        eprintln!("[!] FATAL: could not load program '{}': {e}", program.display());
        process::exit(1);
    }
    if let Some(data_path) = data {
        if let Err(e) = sim.load_data(data_path, config.general.data_base) {
            eprintln!("[!] FATAL: could not load data image '{}': {e}", data_path.display());
            process::exit(1);
        }
    }

    println!("program:    {}", program.display());
    if let Some(data_path) = data {
        println!("data:       {}", data_path.display());
    }
    println!(
        "pipeline:   width={} rob={} iq={} sq={} lsb={}",
        config.pipeline.width,
        config.pipeline.rob_size,
        config.pipeline.iq_size,
        config.pipeline.sq_size,
        config.pipeline.lsb_size
    );
    println!("max_cycles: {}", config.general.max_cycles);
    println!();

    if let Err(e) = sim.run() {
        eprintln!("\n[!] FATAL: {e}");
        print_registers(&sim);
        sim.stats.print(&sim.memory);
        process::exit(1);
    }

    print_registers(&sim);
    if let Some(range) = dump_mem {
        print_memory_range(&sim, range);
    }
    sim.stats.print(&sim.memory);
}

fn load_config(config_path: Option<&std::path::Path>) -> Config {
    let Some(path) = config_path else {
        return Config::default();
    };
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("[!] FATAL: could not read config '{}': {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("[!] FATAL: could not parse config '{}': {e}", path.display());
        process::exit(1);
    })
}

fn print_registers(sim: &Simulator) {
    println!("pc: {:#010x}", sim.arch.pc());
    for row in 0..8 {
        let regs: Vec<String> = (0..4)
            .map(|col| {
                let idx = row * 4 + col;
                format!("r{idx:<2}={:#010x}", sim.arch.read(idx))
            })
            .collect();
        println!("{}", regs.join("  "));
    }
}

fn print_memory_range(sim: &Simulator, range: &str) {
    let Some((start_str, count_str)) = range.split_once(':') else {
        eprintln!("[!] --dump-mem expects <start>:<word_count>, got '{range}'");
        return;
    };
    let Ok(start) = parse_u32(start_str) else {
        eprintln!("[!] could not parse memory range start '{start_str}'");
        return;
    };
    let Ok(count) = count_str.parse::<usize>() else {
        eprintln!("[!] could not parse memory range word count '{count_str}'");
        return;
    };

    println!("\nmemory [{start:#010x}, +{count} words):");
    let words = sim.memory.words();
    let base = (start / 4) as usize;
    for i in 0..count {
        let Some(word) = words.get(base + i) else {
            break;
        };
        println!("  {:#010x}: {word:#010x}", start + (i as u32 * 4));
    }
}

fn parse_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    }
}
