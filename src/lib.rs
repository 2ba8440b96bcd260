#![feature(portable_simd)]
#![feature(try_trait_v2)]
#![feature(let_chains)]

use clap::{Parser, Subcommand};

pub mod align;
pub(crate) mod args;
pub(crate) mod io;
pub mod mapping;
pub mod pipeline;
mod processes;
pub(crate) mod utils;

pub use crate::processes::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Map paired or single-end FASTQ reads against a reference and emit SAM.
    Map(MapArgs),
}
