use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use crate::errors::GuardError;

const BLOCK_SIZE: usize = 64 * 1024;

/// Atomic file replace: write a uniquely named sibling, then rename over.
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<(), GuardError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GuardError::Internal(format!("invalid target path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp, content).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// SHA-256 of a file, streamed in fixed-size blocks. Blocking; run it under
/// `spawn_blocking` from async code.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Shannon entropy in bits per byte, streamed. Empty files score 0.
pub fn shannon_entropy_file(path: &Path) -> std::io::Result<f64> {
    let mut file = std::fs::File::open(path)?;
    let mut counts = [0u64; 256];
    let mut total = 0u64;
    let mut buffer = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        for &b in &buffer[..n] {
            counts[b as usize] += 1;
        }
        total += n as u64;
    }
    Ok(entropy_from_counts(&counts, total))
}

pub fn shannon_entropy(data: &[u8]) -> f64 {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    entropy_from_counts(&counts, data.len() as u64)
}

fn entropy_from_counts(counts: &[u64; 256], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}
