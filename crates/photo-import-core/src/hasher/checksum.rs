use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHECKSUM_CHUNK_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 content hash, hex encoded. Kept for future duplicate
/// detection across batches.
pub fn file_checksum(file: &Path) -> io::Result<String> {
    let mut f = File::open(file)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHECKSUM_CHUNK_SIZE];
    loop {
        let n = f.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
