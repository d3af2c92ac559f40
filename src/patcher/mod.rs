//! Patch orchestration for a game installation.
//!
//! Each artifact moves through the same sequence:
//!
//! 1. marker check: a marker for the requested target short-circuits to
//!    "already patched"
//! 2. backup: pristine copy taken once, never overwritten
//! 3. rewrite: wide-encoded scan of the client binary, or a rebuilt archive
//!    for the server JAR, committed with an atomic write. An artifact marked
//!    for another target is rewritten from its backup instead.
//! 4. mark: sidecar marker recording the target domain
//!
//! A failure in steps 2 or 3 stops that artifact. The client is required; a
//! missing server archive is skipped and an unpatchable one only adds a
//! warning to the result. Signing runs once, after every artifact has been
//! rewritten.

pub mod discovery;
pub mod progress;
pub mod result;
pub mod signing;

pub use discovery::{app_bundle_for, Platform};
pub use progress::{Progress, Scoped, Stage};
pub use result::RewriteResult;
pub use signing::{signer_for, AdhocSigner, NoopSigner, SignError, Signer};

use crate::archive::{self, ArchiveError};
use crate::atomic::atomic_write;
use crate::codec::{CodecError, DomainPattern, EncodedPattern, Encoding, ORIGINAL_DOMAIN};
use crate::rewrite;
use crate::state::{self, PatchMarker, StateError};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("{0}")]
    LengthMismatch(#[from] CodecError),

    #[error("{kind} not found: {}", .path.display())]
    NotFound { kind: ArtifactKind, path: PathBuf },

    #[error("Backup unavailable: {0}")]
    Backup(StateError),

    #[error("Failed to read {kind}: {source}")]
    Read {
        kind: ArtifactKind,
        source: std::io::Error,
    },

    #[error("Failed to write patched {kind}: {source}")]
    Write {
        kind: ArtifactKind,
        source: std::io::Error,
    },

    #[error("Failed to rewrite archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// The two artifacts an installation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Native client executable, text stored wide.
    Client,
    /// Server JAR, text stored narrow inside entries.
    Server,
}

impl ArtifactKind {
    pub const fn label(self) -> &'static str {
        match self {
            ArtifactKind::Client => "Client binary",
            ArtifactKind::Server => "Server JAR",
        }
    }

    pub const fn encoding(self) -> Encoding {
        match self {
            ArtifactKind::Client => Encoding::Wide,
            ArtifactKind::Server => Encoding::Narrow,
        }
    }

    const fn noun(self) -> &'static str {
        match self {
            ArtifactKind::Client => "client",
            ArtifactKind::Server => "server",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened to one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    AlreadyPatched,
    Patched(usize),
}

impl Outcome {
    fn into_result(self) -> RewriteResult {
        match self {
            Outcome::AlreadyPatched => RewriteResult::already_patched(),
            Outcome::Patched(count) => RewriteResult::patched(count),
        }
    }
}

fn to_result(result: Result<Outcome, PatchError>) -> RewriteResult {
    match result {
        Ok(outcome) => outcome.into_result(),
        Err(err) => RewriteResult::failed(err),
    }
}

/// On-disk state of one artifact, for reporting.
#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub marker: Option<PatchMarker>,
    pub has_backup: bool,
    /// Occurrences of the original domain, if the artifact could be scanned.
    pub original_occurrences: Option<usize>,
    /// Occurrences of the target domain, if the artifact could be scanned.
    pub target_occurrences: Option<usize>,
}

/// Rewrites an installation's client and server to a new domain.
pub struct Patcher {
    pattern: DomainPattern,
    platform: Platform,
    signer: Box<dyn Signer>,
    sign: bool,
}

impl Patcher {
    /// Patcher targeting `target_domain`, falling back to the default target
    /// when the domain is empty or has the wrong length.
    pub fn new(target_domain: &str) -> Self {
        Self::from_pattern(DomainPattern::for_target(target_domain))
    }

    /// Patcher targeting `target_domain`, rejecting unusable domains.
    pub fn try_new(target_domain: &str) -> Result<Self, PatchError> {
        Ok(Self::from_pattern(DomainPattern::new(
            ORIGINAL_DOMAIN,
            target_domain,
        )?))
    }

    pub fn from_pattern(pattern: DomainPattern) -> Self {
        let platform = Platform::current();
        Self {
            pattern,
            platform,
            signer: signer_for(platform),
            sign: true,
        }
    }

    /// Use `platform`'s layout and signing requirements.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self.signer = signer_for(platform);
        self
    }

    pub fn with_signer(mut self, signer: Box<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    /// Skip the signing hand-off entirely.
    pub fn without_signing(mut self) -> Self {
        self.sign = false;
        self
    }

    pub fn target_domain(&self) -> &str {
        self.pattern.target()
    }

    pub fn pattern(&self) -> &DomainPattern {
        &self.pattern
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn find_client_path(&self, game_dir: &Path) -> Option<PathBuf> {
        self.platform.find_client(game_dir)
    }

    pub fn find_server_path(&self, game_dir: &Path) -> Option<PathBuf> {
        self.platform.find_server(game_dir)
    }

    /// Patch the client binary at `path`. Does not sign.
    pub fn patch_client(&self, path: &Path, progress: &mut dyn FnMut(&str, u8)) -> RewriteResult {
        let mut progress = Progress::new(progress);
        to_result(self.run(ArtifactKind::Client, path, &mut |msg: &str, pct: u8| {
            progress.report(msg, pct)
        }))
    }

    /// Patch the server JAR at `path`.
    pub fn patch_server(&self, path: &Path, progress: &mut dyn FnMut(&str, u8)) -> RewriteResult {
        let mut progress = Progress::new(progress);
        to_result(self.run(ArtifactKind::Server, path, &mut |msg: &str, pct: u8| {
            progress.report(msg, pct)
        }))
    }

    /// Patch everything found under `game_dir`, then sign the client.
    pub fn ensure_patched(
        &self,
        game_dir: &Path,
        progress: &mut dyn FnMut(&str, u8),
    ) -> RewriteResult {
        let mut progress = Progress::new(progress);

        let Some(client) = self.find_client_path(game_dir) else {
            let err = PatchError::NotFound {
                kind: ArtifactKind::Client,
                path: game_dir.join("Client"),
            };
            warn!("{}", err);
            return RewriteResult::failed(err);
        };

        progress.report("Patching client binary...", 0);
        let client_outcome = {
            let mut scoped = progress.scoped("Client: ", 0, 45);
            self.run(ArtifactKind::Client, &client, &mut |msg: &str, pct: u8| {
                scoped.report(msg, pct)
            })
        };
        let client_outcome = match client_outcome {
            Ok(outcome) => outcome,
            Err(err) => return RewriteResult::failed(err),
        };

        let mut result = client_outcome.into_result();

        match self.find_server_path(game_dir) {
            Some(server) => {
                progress.report("Patching server JAR...", 45);
                let mut scoped = progress.scoped("Server: ", 45, 90);
                match self.run(ArtifactKind::Server, &server, &mut |msg: &str, pct: u8| {
                    scoped.report(msg, pct)
                }) {
                    Ok(outcome) => {
                        let server_result = outcome.into_result();
                        result.patch_count += server_result.patch_count;
                        result.already_patched &= server_result.already_patched;
                    }
                    Err(err) => {
                        warn!("Server patching failed: {}", err);
                        result.warn(format!("Server patching failed: {}", err));
                    }
                }
            }
            None => warn!("Could not find server JAR (this is OK for client-only installs)"),
        }

        if matches!(client_outcome, Outcome::Patched(count) if count > 0) {
            progress.report("Signing client...", 90);
            if let Err(err) = self.sign_client(&client) {
                warn!("Signing failed for {}: {}", client.display(), err);
                result.warn(format!("Signing failed: {}", err));
            }
        }

        progress.report("Patching complete", 100);
        result
    }

    /// Restore client and server from their backups.
    ///
    /// Artifacts that cannot be restored are skipped and reported in the
    /// result's warnings. A missing server JAR is not a warning.
    pub fn restore_patched(
        &self,
        game_dir: &Path,
        progress: &mut dyn FnMut(&str, u8),
    ) -> RewriteResult {
        let mut progress = Progress::new(progress);
        let mut result = RewriteResult::patched(0);

        match self.find_client_path(game_dir) {
            Some(client) => {
                progress.report("Restoring client binary...", 25);
                match state::restore(&client) {
                    Ok(()) => {
                        progress.report("Client binary restored", 50);
                        if let Err(err) = self.sign_client(&client) {
                            warn!("Signing failed for {}: {}", client.display(), err);
                            result.warn(format!("Signing failed: {}", err));
                        }
                    }
                    Err(err) => {
                        warn!("Could not restore client: {}", err);
                        result.warn(format!("Could not restore client: {}", err));
                    }
                }
            }
            None => result.warn(format!(
                "{} not found under {}",
                ArtifactKind::Client,
                game_dir.display()
            )),
        }

        if let Some(server) = self.find_server_path(game_dir) {
            progress.report("Restoring server JAR...", 75);
            match state::restore(&server) {
                Ok(()) => progress.report("Server JAR restored", 90),
                Err(err) => {
                    warn!("Could not restore server: {}", err);
                    result.warn(format!("Could not restore server: {}", err));
                }
            }
        }

        progress.report("Restore complete", 100);
        result
    }

    /// Restore one artifact from its backup.
    pub fn restore_artifact(&self, path: &Path) -> Result<(), PatchError> {
        Ok(state::restore(path)?)
    }

    /// Whether the client under `game_dir` is marked for the current target.
    pub fn is_patched(&self, game_dir: &Path) -> bool {
        self.find_client_path(game_dir)
            .is_some_and(|client| state::is_patched(&client, self.target_domain()))
    }

    /// Marker, backup and occurrence counts for each artifact found.
    pub fn status(&self, game_dir: &Path) -> Vec<ArtifactStatus> {
        let found = [
            (ArtifactKind::Client, self.find_client_path(game_dir)),
            (ArtifactKind::Server, self.find_server_path(game_dir)),
        ];

        found
            .into_iter()
            .filter_map(|(kind, path)| path.map(|path| (kind, path)))
            .map(|(kind, path)| {
                let counts = self.scan_file(kind, &path);
                if let Err(err) = &counts {
                    warn!("Could not scan {}: {}", path.display(), err);
                }
                let counts = counts.ok();
                ArtifactStatus {
                    kind,
                    marker: state::read_marker(&path),
                    has_backup: state::has_backup(&path),
                    original_occurrences: counts.map(|(original, _)| original),
                    target_occurrences: counts.map(|(_, target)| target),
                    path,
                }
            })
            .collect()
    }

    /// Count original and target occurrences in an artifact without changing it.
    pub fn scan_file(&self, kind: ArtifactKind, path: &Path) -> Result<(usize, usize), PatchError> {
        let pattern = self.pattern.encode(kind.encoding());
        let reversed = pattern.reversed();
        match kind {
            ArtifactKind::Client => {
                let data = fs::read(path).map_err(|source| PatchError::Read { kind, source })?;
                Ok((rewrite::count(&data, &pattern), rewrite::count(&data, &reversed)))
            }
            ArtifactKind::Server => Ok((
                archive::count_in_archive(path, &pattern)?,
                archive::count_in_archive(path, &reversed)?,
            )),
        }
    }

    /// Hand the client (or its enclosing bundle) to the signer.
    fn sign_client(&self, client: &Path) -> Result<(), SignError> {
        if !self.sign || !self.platform.requires_signing() {
            return Ok(());
        }

        match app_bundle_for(client) {
            Some(bundle) => self.signer.sign(&bundle, true),
            None => self.signer.sign(client, false),
        }
    }

    fn run(
        &self,
        kind: ArtifactKind,
        path: &Path,
        progress: &mut dyn FnMut(&str, u8),
    ) -> Result<Outcome, PatchError> {
        let noun = kind.noun();
        let target = self.target_domain();

        info!("Patching {}: {}", path.display(), self.pattern);

        if !path.is_file() {
            return Err(PatchError::NotFound {
                kind,
                path: path.to_path_buf(),
            });
        }

        let marker = state::read_marker(path);
        if marker.as_ref().is_some_and(|m| m.target_domain == target) {
            info!("{} already patched for {}, skipping", kind, target);
            progress(&format!("{} already patched", capitalize(noun)), Stage::Complete.percent());
            return Ok(Outcome::AlreadyPatched);
        }

        progress(&format!("Preparing to patch {}...", noun), Stage::Preparing.percent());
        // Content marked for another target no longer holds the original
        // domain; start again from the pristine backup.
        let pristine = match &marker {
            Some(previous) => {
                info!(
                    "Retargeting {} from {} to {}",
                    path.display(),
                    previous.target_domain,
                    target
                );
                Some(state::read_backup(path).map_err(PatchError::Backup)?)
            }
            None => {
                state::ensure_backup(path).map_err(PatchError::Backup)?;
                None
            }
        };

        let encoded = self.pattern.encode(kind.encoding());
        let (data, count) = match kind {
            ArtifactKind::Client => self.rewrite_binary(path, pristine, &encoded, progress)?,
            ArtifactKind::Server => {
                progress("Opening server JAR...", Stage::Reading.percent());
                progress("Patching class files...", Stage::Rewriting.percent());
                let rebuilt = match pristine {
                    Some(bytes) => archive::rewrite_archive_from(Cursor::new(bytes), &encoded)?,
                    None => archive::rewrite_archive(path, &encoded)?,
                };
                info!(
                    "Scanned {} entries, rewrote {}",
                    rebuilt.entries,
                    rebuilt.rewritten.len()
                );
                (rebuilt.bytes, rebuilt.occurrences)
            }
        };

        if count == 0 {
            info!(
                "No occurrences of {} found in {}",
                self.pattern.original(),
                path.display()
            );
            progress("No domain references found", Stage::Complete.percent());
            return Ok(Outcome::Patched(0));
        }

        progress(&format!("Writing patched {}...", noun), Stage::Writing.percent());
        atomic_write(path, &data).map_err(|source| PatchError::Write { kind, source })?;

        let mut marker = PatchMarker::new(self.pattern.original(), target);
        if let Ok(hash) = state::backup_hash(path) {
            marker = marker.with_backup_hash(hash);
        }
        if let Err(err) = state::write_marker(path, &marker) {
            warn!("Failed to mark {} as patched: {}", path.display(), err);
        }

        info!("Patched {} domain occurrence(s) in {}", count, path.display());
        progress("Patching complete", Stage::Complete.percent());
        Ok(Outcome::Patched(count))
    }

    fn rewrite_binary(
        &self,
        path: &Path,
        pristine: Option<Vec<u8>>,
        encoded: &EncodedPattern,
        progress: &mut dyn FnMut(&str, u8),
    ) -> Result<(Vec<u8>, usize), PatchError> {
        progress("Reading client binary...", Stage::Reading.percent());
        let mut data = match pristine {
            Some(data) => data,
            None => fs::read(path).map_err(|source| PatchError::Read {
                kind: ArtifactKind::Client,
                source,
            })?,
        };
        info!("Binary size: {:.2} MB", data.len() as f64 / 1024.0 / 1024.0);

        progress("Patching domain references...", Stage::Rewriting.percent());
        let count = rewrite::rewrite(&mut data, encoded);
        Ok((data, count))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
