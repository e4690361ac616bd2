use clap::Parser;

//
// For parsing the job description off the command line.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Name of the workload to run (word-count or char-freq).
    #[arg(short, long, default_value = "word-count")]
    pub workload: String,

    /// Input file to read lines from. A built-in sample corpus is used
    /// when omitted.
    #[arg(short, long)]
    pub input: Option<String>,

    /// Number of mapper workers in the pool.
    #[arg(short, long, default_value_t = 2)]
    pub mappers: usize,

    /// Number of reducer nodes.
    #[arg(short, long, default_value_t = 2)]
    pub reducers: usize,

    /// Simulated per-input mapper latency in milliseconds.
    #[arg(long, default_value_t = 5)]
    pub latency_ms: u64,

    /// Reject the job on the first worker failure instead of logging and
    /// carrying on.
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Print the result table as JSON instead of aligned text.
    #[arg(long)]
    pub json: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
