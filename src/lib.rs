use pretty_env_logger;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn _setup_pretty_env_logger_default() {
    INIT.call_once(|| {
        pretty_env_logger::init();
    });
}

pub use series::{FieldSeries, FieldSeriesBuilder, MISSING_SENTINEL};

pub mod analysis;
pub mod assembler;
pub mod config;
pub mod extrapolate;
pub mod grid;
pub mod io;
pub mod motion;
pub mod observations;
pub mod series;
