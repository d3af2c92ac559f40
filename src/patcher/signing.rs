//! Post-patch code signing.
//!
//! Rewriting a binary invalidates its signature. On macOS the patched client
//! (or its `.app` bundle) gets its quarantine attributes stripped and an
//! ad-hoc signature applied so Gatekeeper still lets it launch.

use super::discovery::Platform;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SignError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("{tool} failed: {output}")]
    Failed { tool: &'static str, output: String },
}

/// Applies a signature to a patched artifact.
pub trait Signer {
    /// Sign `path`. `deep` signs nested code inside a bundle as well.
    fn sign(&self, path: &Path, deep: bool) -> Result<(), SignError>;
}

/// Signer for platforms that do not enforce code signing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl Signer for NoopSigner {
    fn sign(&self, path: &Path, _deep: bool) -> Result<(), SignError> {
        debug!("Skipping signing of {}", path.display());
        Ok(())
    }
}

/// `xattr -cr` followed by `codesign --force --sign -`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdhocSigner;

impl AdhocSigner {
    fn codesign_args(path: &Path, deep: bool) -> Vec<&OsStr> {
        let mut args = Vec::with_capacity(5);
        if deep {
            args.push(OsStr::new("--deep"));
        }
        args.extend(["--force", "--sign", "-"].map(OsStr::new));
        args.push(path.as_os_str());
        args
    }
}

impl Signer for AdhocSigner {
    fn sign(&self, path: &Path, deep: bool) -> Result<(), SignError> {
        info!("Signing {}", path.display());

        // Quarantine removal is best effort; codesign reports the real failure.
        if let Err(err) = Command::new("xattr").arg("-cr").arg(path).output() {
            debug!("xattr failed on {}: {}", path.display(), err);
        }

        let output = Command::new("codesign")
            .args(Self::codesign_args(path, deep))
            .output()
            .map_err(|source| SignError::Spawn {
                tool: "codesign",
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(SignError::Failed {
                tool: "codesign",
                output: text.trim().to_string(),
            });
        }

        info!("Signed {} successfully", path.display());
        Ok(())
    }
}

/// Signer matching `platform`'s requirements.
pub fn signer_for(platform: Platform) -> Box<dyn Signer> {
    if platform.requires_signing() {
        Box::new(AdhocSigner)
    } else {
        Box::new(NoopSigner)
    }
}
