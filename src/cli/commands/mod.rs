//! CLI command implementations.

mod classify;
mod config;
mod describe;
mod inspect;

pub use classify::{run_classify, ClassifyArgs};
pub use config::{run_config, ConfigArgs};
pub use describe::{run_describe, DescribeArgs};
pub use inspect::{run_inspect, InspectArgs};
