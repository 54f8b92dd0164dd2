pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod label;
pub mod report;
pub mod storage;

pub use classify::{classify, Interval, MismatchCategory, Report, Run};
pub use error::{Error, Result};
pub use label::{FrameLabel, LabelSequence};
