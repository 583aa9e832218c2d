pub mod conda;
pub mod config;
pub mod envname;
pub mod overlay;
pub mod runner;
pub mod scripts;
pub mod sif;
