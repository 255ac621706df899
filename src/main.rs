use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, error, info};
use onnx_typecast::{ConvertOptions, Precision, convert_file, logger};

#[derive(Parser, Debug)]
#[command(author, version, about = "ONNX INT64 to INT32/INT16/INT8 converter", long_about = None)]
struct Cli {
    /// Path to the source ONNX model
    model_path: PathBuf,
    /// Path to write the converted model
    out_path: PathBuf,
    /// Target integer width: 8, 16 or 32
    precision: u32,
    /// Fail instead of wrapping when a value does not fit the target width
    #[arg(long)]
    strict: bool,
    /// Log per-tensor detail
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> onnx_typecast::Result<()> {
    // validated before any file is opened
    let precision = Precision::try_from(cli.precision)?;
    let mut options = ConvertOptions::new(precision);
    if cli.strict {
        options = options.strict();
    }

    convert_file(&cli.model_path, &cli.out_path, &options)?;
    info!("Done.");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = logger::init_log(level) {
        eprintln!("failed to initialise logging: {}", e);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
