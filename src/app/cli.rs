use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "survey")]
#[command(about = "Terminal survey wizard collecting feedback on the Model X image model")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SURVEY_GIT_SHA"), ")"))]
pub struct Cli {
    /// Survey config file (defaults to $SURVEY_CONFIG, then the built-in survey)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the role screen and start with this role (public, designer, expert)
    #[arg(long)]
    pub role: Option<String>,

    /// Answer the survey from a YAML script instead of the terminal UI
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Do not pad short question sequences with filler questions
    #[arg(long)]
    pub no_pad: bool,

    /// Start with the answers panel open
    #[arg(long)]
    pub debug: bool,

    /// Print the question sequence of a role as JSON and exit
    #[arg(long, value_name = "ROLE")]
    pub print_catalog: Option<String>,

    /// Print the recorded answers as JSON after the terminal UI exits
    #[arg(long)]
    pub dump_answers: bool,
}
