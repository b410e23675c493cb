use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(value_parser, value_name = "CHECKPOINT")]
    /// The checkpoint to convert (FILE.aa and FILE.ab are joined if FILE is missing)
    input: PathBuf,

    #[clap(value_parser, value_name = "FILE")]
    /// The output filename
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sp = npn_oracle::raw::convert(&args.input, &args.output)?;
    log::info!(
        "{} records, level sizes {:?}",
        sp.howto.len(),
        sp.by_size.iter().map(Vec::len).collect::<Vec<_>>()
    );

    Ok(())
}
