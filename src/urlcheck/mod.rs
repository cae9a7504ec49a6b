//! URL-check mode: the second daemon `spec.md` §2 and §4.5 describe,
//! sharing the queue adapter contract with the notification dispatch core
//! but routing through a redirect-history analyzer instead of an HTTP
//! callback.

pub mod analyzer;
pub mod worker;

pub use analyzer::{normalize_url, RedirectAnalyzer, RedirectHistory, ReqwestRedirectAnalyzer};
pub use worker::{run_loop, run_once, WorkerTuning};
