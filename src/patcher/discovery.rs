//! Locating the client binary and server archive in an installation.

use std::path::{Path, PathBuf};

/// Installation layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    /// Platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Whether binaries must carry a valid signature to launch.
    pub const fn requires_signing(self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// Client binary locations, most specific first.
    pub fn client_candidates(self, game_dir: &Path) -> Vec<PathBuf> {
        let client = game_dir.join("Client");
        match self {
            Platform::MacOs => vec![
                client
                    .join("Hytale.app")
                    .join("Contents")
                    .join("MacOS")
                    .join("HytaleClient"),
                client.join("HytaleClient"),
            ],
            Platform::Windows => vec![client.join("HytaleClient.exe")],
            Platform::Linux => vec![client.join("HytaleClient")],
        }
    }

    /// Server archive locations, most specific first.
    pub fn server_candidates(self, game_dir: &Path) -> Vec<PathBuf> {
        let server = game_dir.join("Server");
        vec![server.join("HytaleServer.jar"), server.join("server.jar")]
    }

    pub fn find_client(self, game_dir: &Path) -> Option<PathBuf> {
        first_existing(self.client_candidates(game_dir))
    }

    pub fn find_server(self, game_dir: &Path) -> Option<PathBuf> {
        first_existing(self.server_candidates(game_dir))
    }
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|path| path.exists())
}

/// The `.app` bundle enclosing a client binary at
/// `<bundle>.app/Contents/MacOS/<binary>`, if there is one.
pub fn app_bundle_for(client: &Path) -> Option<PathBuf> {
    let bundle = client.parent()?.parent()?.parent()?;
    let is_bundle = bundle
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("app"));
    is_bundle.then(|| bundle.to_path_buf())
}
