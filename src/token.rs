// Opaque public identifiers derived from game folder names.

use sha2::{Digest, Sha256};

/// Derive the public token for a game folder.
///
/// SHA-256 of the folder name, hex encoded. Tokens end up in URLs handed out
/// to clients, so the output must stay identical across restarts.
pub fn derive(folder_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(folder_name.as_bytes());
    hex::encode(hasher.finalize())
}
