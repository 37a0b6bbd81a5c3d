// thundercast/src/analysis/mod.rs

mod builder;
mod errors;
mod oi;

pub use builder::{AnalysisBuilder, AnalysisField};
pub use errors::AnalysisError;
pub use oi::{optimal_interpolation, StructureFunction};
