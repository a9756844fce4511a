//! Tools for writing Kubernetes manifests.

use crate::prelude::*;

/// Render `objects` as a multi-document YAML stream, suitable for passing to
/// `kubectl apply -f -`.
pub fn render_manifests<T: Serialize>(objects: &[T]) -> Result<String> {
    let mut manifest = String::new();
    for obj in objects {
        let yaml = serde_yaml::to_string(obj).context("error rendering manifest")?;
        manifest.push_str("---\n");
        manifest.push_str(&yaml);
    }
    Ok(manifest)
}

#[test]
fn render_manifests_separates_documents() {
    use crate::k8s::ConfigMap;

    let manifest = render_manifests(&[
        ConfigMap::new("a").with_binary_data("file", b"x".to_vec()),
        ConfigMap::new("b"),
    ])
    .unwrap();
    assert_eq!(manifest.matches("---\n").count(), 2);
    assert!(manifest.contains("name: a\n"));
    assert!(manifest.contains("file: eA==\n"));

    let docs = manifest
        .split("---\n")
        .filter(|d| !d.is_empty())
        .map(|d| serde_yaml::from_str::<ConfigMap>(d).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(docs[1].metadata.name, "b");
}
