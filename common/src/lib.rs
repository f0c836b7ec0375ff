//! Logging plumbing shared by the stockwatch binaries and jobs.

pub mod logger;

pub use logger::{TraceId, init_logger, job_span, warn_if_slow};
