use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "iqabench",
    version,
    about = "MLLM image-quality benchmarking harness"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Prompts(PromptsArgs),
    Validate(ValidateArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "bench_config.json")]
    pub config: PathBuf,

    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long = "dataset")]
    pub datasets: Vec<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodFilter {
    DirectOutput,
    DirectOutputWithRegex,
    SoftmaxBased,
    CcotDirectGuided,
}

#[derive(Args, Debug, Clone)]
pub struct PromptsArgs {
    #[arg(long, default_value = "bench_config.json")]
    pub config: PathBuf,

    #[arg(long, value_enum)]
    pub method: Option<MethodFilter>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "bench_config.json")]
    pub config: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
}
