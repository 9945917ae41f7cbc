use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info};

use typebc::bytecode::compile::compile_source_file;
use typebc::bytecode::disasm::print_bc;
use typebc::lang::node::Node;

/// Lower a type-level syntax tree into type VM bytecode.
#[derive(Debug, Parser)]
#[command(name = "typebc", version)]
struct Args {
    /// postcard-encoded source file tree
    input: PathBuf,

    /// Where to write the image (default: INPUT with a .bin extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the decoded tree and stop
    #[arg(long)]
    ast: bool,

    /// Print a listing of the linked image
    #[arg(long, visible_alias = "bc")]
    disasm: bool,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let tree = Node::from_bytes(&bytes).map_err(|e| {
        anyhow::anyhow!("'{}' is not an encoded syntax tree: {}", args.input.display(), e)
    })?;

    if args.ast {
        println!("{:#?}", tree);
        return Ok(());
    }

    let linked = compile_source_file(&tree)?.link()?;
    info!(
        "{} routine(s), {} storage entries, main at {}",
        linked.routines.len(),
        linked.storage.len(),
        linked.main_address
    );

    if args.disasm {
        print_bc(&linked);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("bin"));
    fs::write(&output, &linked.bytes)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!("wrote {} bytes to {}", linked.bytes.len(), output.display());

    Ok(())
}
