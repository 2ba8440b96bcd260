pub mod standalone;

pub use standalone::map::{MapArgs, map_process};
