//! Streaming file digests and verification.

use crate::error::TransferResult;
use launchpad_core::{Checksum, ChecksumAlgorithm, Checksums, READ_BLOCK_SIZE};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Digest a file without holding it in memory.
pub async fn compute_file_checksum(
    path: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
) -> TransferResult<Checksum> {
    let mut checksums = compute_file_checksums(path, &[algorithm]).await?;
    Ok(checksums.remove(0))
}

/// Lowercase hex SHA-256 of a file.
pub async fn compute_file_sha256(path: impl AsRef<Path>) -> TransferResult<String> {
    Ok(compute_file_checksum(path, ChecksumAlgorithm::Sha256)
        .await?
        .hash)
}

/// Digest a file with several algorithms in a single read pass.
pub async fn compute_file_checksums(
    path: impl AsRef<Path>,
    algorithms: &[ChecksumAlgorithm],
) -> TransferResult<Vec<Checksum>> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hashers: Vec<_> = algorithms.iter().map(|alg| alg.hasher()).collect();
    let mut buf = vec![0u8; READ_BLOCK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for hasher in &mut hashers {
            hasher.update(&buf[..n]);
        }
    }

    Ok(hashers.into_iter().map(|h| h.finalize()).collect())
}

/// Compute every configured slot of `expected` and compare.
///
/// All slots are computed before any comparison, so the returned error
/// names the first mismatching slot with both digests.
pub async fn verify_file_checksums(
    path: impl AsRef<Path>,
    expected: &Checksums,
) -> TransferResult<Checksums> {
    let slots = expected.slots();
    let algorithms: Vec<_> = slots.iter().map(|(_, c)| c.algorithm).collect();
    let computed = compute_file_checksums(path.as_ref(), &algorithms).await?;

    let mut result = Checksums::default();
    for ((slot, want), got) in slots.iter().zip(&computed) {
        if *slot == "file" {
            result.file = Some(got.clone());
        }
        tracing::trace!(slot, expected = %want.hash, actual = %got.hash, "checksum computed");
    }

    for ((slot, want), got) in slots.iter().zip(&computed) {
        if !want.matches(got) {
            return Err(launchpad_core::Error::ChecksumMismatch {
                slot: (*slot).to_string(),
                expected: want.hash.clone(),
                actual: got.hash.clone(),
            }
            .into());
        }
    }

    Ok(result)
}
