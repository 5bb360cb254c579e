use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Combine multiple Kraken2 or Bracken reports into a single merged report with per-sample counts."
)]
pub struct Cli {
    /// Kraken report files to combine
    #[arg(short = 'r', long = "reports", num_args(1..), required = true)]
    pub reports: Vec<PathBuf>,
    /// Output combined report file
    #[arg(short, long)]
    pub output: PathBuf,
    /// Sample names used as column headers, one per report
    #[arg(long = "sample-names", num_args(1..))]
    pub sample_names: Vec<String>,
    /// Bracken input - omits the unclassified row from all outputs
    #[arg(long, action)]
    pub bracken: bool,
    /// Also write one report per major taxonomic rank, named <output>-<rank>
    #[arg(long = "split-ranks", action)]
    pub split_ranks: bool,
    /// Print a JSON summary of the run to stdout
    #[arg(long, action)]
    pub summary: bool,
    #[arg(short, long, action)]
    pub verbose: bool,
}
