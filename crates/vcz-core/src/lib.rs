pub mod config;
pub mod logging;

pub mod checkpoint;
pub mod control;
pub mod encoder;
pub mod fingerprint;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod scan;
pub mod scheduler;
pub mod segmenter;
pub mod storage;
