//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spotgazer")]
#[command(version)]
#[command(about = "Parking lot occupancy estimation from live camera streams")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path; without it the configuration comes from the environment
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to --config)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
}
