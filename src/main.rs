use clap::{Args, Parser, Subcommand};
use npn_oracle::checkpoint::CheckpointStore;
use npn_oracle::enumerate::{EnumerateOptions, Enumerator, Outcome, MAX_LEVEL};
use npn_oracle::query::Table;
use npn_oracle::Func;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the minimal circuit size of every function, level by level
    Enumerate(EnumerateArgs),
    /// Look up functions in a converted table
    Query(QueryArgs),
    /// List every record of a converted table
    Dump(TableArgs),
}

#[derive(Args, Debug)]
struct EnumerateArgs {
    #[clap(short, long, value_parser, default_value_t = 4)]
    /// The number of input variables (2 to 5)
    vars: usize,

    #[clap(long)]
    /// Allow XOR gates
    xor: bool,

    #[clap(long, value_parser, value_name = "LEVEL", default_value_t = MAX_LEVEL)]
    /// Switch from pair generation to targeted search above this level
    cutoff: usize,

    #[clap(long, value_parser, value_name = "LEVEL")]
    /// Rebuild this level and everything above it instead of trusting the checkpoint
    redo: Option<usize>,

    #[clap(long, value_parser, value_name = "DIR", default_value = ".")]
    /// Where checkpoints are read from and written to
    checkpoint_dir: PathBuf,

    #[clap(long)]
    /// Neither resume from nor write checkpoints
    no_checkpoint: bool,

    #[clap(long, value_parser, value_name = "N", default_value_t = 4096)]
    /// Unvisited functions searched in parallel at once
    search_batch: usize,

    #[clap(short = 'j', long, value_parser, value_name = "N")]
    /// Worker threads for the targeted search (defaults to one per core)
    threads: Option<usize>,
}

impl From<&EnumerateArgs> for EnumerateOptions {
    fn from(args: &EnumerateArgs) -> Self {
        Self {
            vars: args.vars,
            xor: args.xor,
            cutoff: args.cutoff,
            redo: args.redo,
            search_batch: args.search_batch,
            ..Self::default()
        }
    }
}

#[derive(Args, Debug)]
struct TableArgs {
    #[clap(short, long, value_parser, default_value_t = 4)]
    /// The number of input variables the table was built for
    vars: usize,

    #[clap(short, long, value_parser, value_name = "FILE")]
    /// The converted table (see raw_convert)
    table: PathBuf,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[clap(flatten)]
    table: TableArgs,

    #[clap(value_parser, value_name = "FUNC", required = true)]
    /// Truth tables to look up, as 0x.., 0b.. or decimal values (@FILE reads them from FILE)
    funcs: Vec<Func>,
}

fn enumerate(args: &EnumerateArgs) -> anyhow::Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            log::warn!("interrupted, stopping after the current level");
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    let mut enumerator = Enumerator::new(args.into())?;
    let store = (!args.no_checkpoint)
        .then(|| CheckpointStore::new(&args.checkpoint_dir, args.vars, args.xor));
    if let Some(store) = &store {
        if enumerator.restore(store).is_none() {
            log::info!("no usable checkpoint in {}", store.dir().display());
        }
    }

    match enumerator.run(store.as_ref(), &stop)? {
        Outcome::Complete => {
            let mut out = BufWriter::new(io::stdout().lock());
            for (level, bucket) in enumerator.levels().iter().enumerate() {
                writeln!(out, "{level}: {}", bucket.len())?;
            }
            writeln!(out, "total: {}", enumerator.records().len())?;
        }
        Outcome::Stopped { next_level } => {
            log::info!("stopped; rerun to continue from level {next_level}");
        }
    }
    Ok(())
}

fn query(args: &QueryArgs) -> anyhow::Result<()> {
    let table = Table::load_raw(args.table.vars, &args.table.table)?;
    let mut out = BufWriter::new(io::stdout().lock());
    for &f in &args.funcs {
        let answer = table.lookup(f)?;
        writeln!(
            out,
            "{}: canonical {}, size {}: {}",
            answer.func, answer.canon, answer.size, answer.tree
        )?;
    }
    Ok(())
}

fn dump(args: &TableArgs) -> anyhow::Result<()> {
    let table = Table::load_raw(args.vars, &args.table)?;
    let mut out = BufWriter::new(io::stdout().lock());
    table.dump(&mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = argfile::expand_args_from(wild::args_os(), argfile::parse_fromfile, argfile::PREFIX)?;
    let cli = Cli::parse_from(args);

    match &cli.command {
        Command::Enumerate(args) => enumerate(args),
        Command::Query(args) => query(args),
        Command::Dump(args) => dump(args),
    }
}
