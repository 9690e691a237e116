//! Demo-session signup: a five-step form, a submission client with a local
//! mirror, a delivery endpoint that appends rows to a sheet, and a read-only
//! admin summary.
pub mod admin;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod form;
pub mod mirror;
pub mod record;
pub mod util;
pub mod wire;
