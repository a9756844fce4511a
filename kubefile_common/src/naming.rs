//! Deterministic names for the resources we generate.

use sha2::{Digest, Sha256};

/// Prefix for the names of file volumes.
const FILE_NAME_PREFIX: &str = "file-";

/// Number of hex digits of the digest to keep.
const DIGEST_HEX_LEN: usize = 10;

/// Generate the name shared by the volume, the volume mount and the ConfigMap
/// suffix for the file mounted at `mount_path`.
///
/// This is a pure function of `mount_path`, and it's always a legal DNS label.
/// Truncating the digest to 40 bits means two different paths can collide,
/// which we accept: a workload would need on the order of a million files
/// before it became likely.
pub fn file_resource_name(mount_path: &str) -> String {
    let digest = Sha256::digest(mount_path.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(DIGEST_HEX_LEN);
    format!("{}{}", FILE_NAME_PREFIX, encoded)
}

#[test]
fn file_resource_name_is_stable() {
    assert_eq!(file_resource_name("/some/mount"), "file-53b1563f1b");
    assert_eq!(
        file_resource_name("/some/mount"),
        file_resource_name("/some/mount")
    );
}

#[test]
fn file_resource_name_depends_on_path() {
    let a = file_resource_name("/etc/app/a.conf");
    let b = file_resource_name("/etc/app/b.conf");
    assert_ne!(a, b);
    for name in &[a, b] {
        assert_eq!(name.len(), FILE_NAME_PREFIX.len() + DIGEST_HEX_LEN);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}
