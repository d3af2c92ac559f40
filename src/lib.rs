//! Domain Patcher: length-preserving domain rewrites for compiled artifacts
//!
//! Redirects a game installation to a different service endpoint by
//! overwriting the domain name embedded in its native client binary and
//! server JAR, without changing any artifact's size.
//!
//! # Architecture
//!
//! Every rewrite compiles down to one primitive: a same-length byte
//! substitution ([`rewrite::rewrite`]) driven by an [`EncodedPattern`].
//! The client stores its strings wide (UTF-16LE) and is patched in place;
//! the server JAR stores them narrow inside entries and is rebuilt entry by
//! entry ([`archive::rewrite_archive`]).
//!
//! # Safety
//!
//! - Original and target domains must have the same length
//! - A pristine backup is taken once and never overwritten
//! - Atomic file writes (tempfile + fsync + rename)
//! - Sidecar markers make repeated runs idempotent
//! - Restore refuses a backup whose fingerprint disagrees with the marker
//!
//! # Example
//!
//! ```no_run
//! use domain_patcher::Patcher;
//! use std::path::Path;
//!
//! let patcher = Patcher::new("sanasol.ws");
//! let result = patcher.ensure_patched(Path::new("/opt/game"), &mut |msg, pct| {
//!     println!("[{pct:>3}%] {msg}");
//! });
//!
//! if !result.success {
//!     eprintln!("{}", result);
//! }
//! ```

pub mod archive;
pub mod atomic;
pub mod auth;
pub mod codec;
pub mod config;
pub mod patcher;
pub mod rewrite;
pub mod state;

// Re-exports
pub use archive::{ArchiveError, ArchiveRewrite};
pub use auth::{AuthClient, AuthError, AuthTokens};
pub use codec::{
    CodecError, DomainPattern, EncodedPattern, Encoding, DEFAULT_TARGET_DOMAIN, ORIGINAL_DOMAIN,
};
pub use config::{load_default, load_from_path, load_from_str, ConfigError, PatcherConfig};
pub use patcher::{
    ArtifactKind, ArtifactStatus, PatchError, Patcher, Platform, RewriteResult, Signer,
};
pub use state::{PatchMarker, StateError};
