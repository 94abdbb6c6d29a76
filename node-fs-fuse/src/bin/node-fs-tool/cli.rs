use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Create and inspect node-fs disk images")]
pub struct Cli {
    /// Disk image file
    #[arg(long, short, global = true, default_value = "fs.img")]
    pub image: PathBuf,

    /// Node cache capacity in slots
    #[arg(long, global = true, default_value_t = 16)]
    pub cache: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a fresh image and format it
    Format {
        /// Image size in MiB
        #[arg(long, default_value_t = 4)]
        size_mib: u64,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the whole tree
    Tree,
    /// Create a directory
    Mkdir { path: String },
    /// Create an empty file
    Touch { path: String },
    /// Replace the content of a file, creating it if needed
    Write { path: String, text: String },
    /// Print the content of a file
    Cat { path: String },
    /// Remove a file or an empty directory
    Rm { path: String },
    /// Show disk and cache usage
    Df,
}
