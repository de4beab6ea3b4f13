//! Client boundary to the external page-scanning engine.
//!
//! The platform treats the engine as one opaque async call: given a URL and
//! a WCAG level it either returns issue data or fails. [`ScanEngine`] is the
//! seam the worker is written against; [`HttpScanEngine`] is the production
//! implementation talking to the engine service over HTTP.

pub mod engine;
pub mod http;

pub use engine::{EngineError, RawIssue, ScanEngine, ScanOutcome};
pub use http::{HttpEngineConfig, HttpScanEngine};
