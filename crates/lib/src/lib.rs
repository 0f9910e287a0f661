//! jsforge-lib: native build pipeline for an embedded JavaScript engine.
//!
//! The pipeline fetches a source tarball of the engine, unpacks it, provisions
//! a pinned CMake, configures and compiles the engine's bytecode compiler, and
//! stages public headers for the host application's native packaging:
//! - `config`: the immutable per-session configuration
//! - `steps`: one module per pipeline step
//! - `fingerprint`: input fingerprints and up-to-date records
//! - `execute`: the dependency graph and its wave executor

pub mod config;
pub mod consts;
pub mod execute;
pub mod fingerprint;
pub mod layout;
pub mod process;
pub mod steps;
pub mod util;
pub mod version;
