//! Content fingerprint of a capture file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pcapai_core::CaptureIdentity;
use sha2::{Digest, Sha256};

use crate::error::ParseError;

const CHUNK: usize = 64 * 1024;

/// Hash the file contents and build its identity.
///
/// The file is streamed, so arbitrarily large captures hash in constant
/// memory. The path is canonicalized when possible.
pub fn capture_identity(path: &Path) -> Result<CaptureIdentity, ParseError> {
    let unreadable = |e: std::io::Error| ParseError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let file = File::open(path).map_err(unreadable)?;
    let mut reader = BufReader::with_capacity(CHUNK, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    let mut size_bytes = 0u64;
    loop {
        let n = reader.read(&mut buf).map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size_bytes += n as u64;
    }

    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(CaptureIdentity {
        path,
        fingerprint: hex::encode(hasher.finalize()),
        size_bytes,
    })
}
