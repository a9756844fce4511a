//! A minimal Score-like workload file, and the code which converts all of a
//! workload's container files at once.

use crate::{
    expand::Expander,
    files::{ContainerFile, ContainerFileConverter},
    k8s::{ConfigMap, Volume, VolumeMount},
    prelude::*,
};
use serde::de::{Deserializer, Error as DeError, MapAccess, SeqAccess, Visitor};
use std::result;

/// Represents a workload `*.yaml` file. We only parse what we need and
/// ignore everything else.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Workload {
    /// Workload metadata.
    pub metadata: WorkloadMetadata,
    /// Containers, by name.
    #[serde(default)]
    pub containers: BTreeMap<String, Container>,
}

/// Workload metadata.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WorkloadMetadata {
    /// The workload name, used to prefix generated resources.
    pub name: String,
}

/// A single container.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Container {
    /// Files to mount into this container.
    #[serde(default)]
    pub files: ContainerFiles,
}

/// Container files may be written as a map keyed by mount path, or as a
/// list where each entry has a `target`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContainerFiles {
    /// `files: { /etc/x.conf: { content: ... } }`
    ByTarget(BTreeMap<String, ContainerFile>),
    /// `files: [ { target: /etc/x.conf, content: ... } ]`
    List(Vec<TargetedContainerFile>),
}

impl Default for ContainerFiles {
    fn default() -> Self {
        ContainerFiles::ByTarget(BTreeMap::new())
    }
}

impl ContainerFiles {
    /// Return `(mount path, file)` pairs, sorted by mount path.
    pub fn entries(&self) -> Vec<(&str, &ContainerFile)> {
        let mut entries = match self {
            ContainerFiles::ByTarget(map) => map
                .iter()
                .map(|(target, file)| (target.as_str(), file))
                .collect::<Vec<_>>(),
            ContainerFiles::List(list) => list
                .iter()
                .map(|f| (f.target.as_str(), &f.file))
                .collect::<Vec<_>>(),
        };
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

// We pick the layout by looking at the YAML node ourselves, instead of using
// `#[serde(untagged)]`, so that errors inside a file (like a misspelled key)
// are reported as-is rather than as "did not match any variant".
impl<'de> Deserialize<'de> for ContainerFiles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_any(ContainerFilesVisitor)
    }
}

/// Visitor for `ContainerFiles`.
struct ContainerFilesVisitor;

impl<'de> Visitor<'de> for ContainerFilesVisitor {
    type Value = ContainerFiles;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of mount paths to files, or a list of files with targets")
    }

    fn visit_unit<E: DeError>(self) -> result::Result<Self::Value, E> {
        Ok(ContainerFiles::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> result::Result<Self::Value, A::Error> {
        let mut files = BTreeMap::new();
        while let Some((target, file)) = map.next_entry::<String, ContainerFile>()? {
            files.insert(target, file);
        }
        Ok(ContainerFiles::ByTarget(files))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> result::Result<Self::Value, A::Error> {
        let mut files = vec![];
        while let Some(file) = seq.next_element::<TargetedContainerFile>()? {
            files.push(file);
        }
        Ok(ContainerFiles::List(files))
    }
}

/// A `ContainerFile` with an explicit mount path.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "FlatTargetedFile", into = "FlatTargetedFile")]
pub struct TargetedContainerFile {
    /// Where to mount the file.
    pub target: String,
    /// The file itself.
    pub file: ContainerFile,
}

/// How a `TargetedContainerFile` is written. `#[serde(flatten)]` would
/// silently ignore `deny_unknown_fields`, so we spell out every field.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FlatTargetedFile {
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    no_expand: Option<bool>,
}

impl From<FlatTargetedFile> for TargetedContainerFile {
    fn from(flat: FlatTargetedFile) -> Self {
        TargetedContainerFile {
            target: flat.target,
            file: ContainerFile {
                mode: flat.mode,
                content: flat.content,
                source: flat.source,
                no_expand: flat.no_expand,
            },
        }
    }
}

impl From<TargetedContainerFile> for FlatTargetedFile {
    fn from(targeted: TargetedContainerFile) -> Self {
        let ContainerFile {
            mode,
            content,
            source,
            no_expand,
        } = targeted.file;
        FlatTargetedFile {
            target: targeted.target,
            mode,
            content,
            source,
            no_expand,
        }
    }
}

/// The volumes and mounts needed by one container.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerFileMounts {
    /// The container these belong to.
    pub container: String,
    /// Pod volumes.
    pub volumes: Vec<Volume>,
    /// Container volume mounts.
    pub volume_mounts: Vec<VolumeMount>,
}

/// Everything generated for a workload's files.
#[derive(Clone, Debug, Default)]
pub struct ConvertedWorkloadFiles {
    /// ConfigMaps to create.
    pub config_maps: Vec<ConfigMap>,
    /// Volumes and mounts, per container.
    pub containers: Vec<ContainerFileMounts>,
}

/// Convert every file of every container in `workload`.
///
/// ConfigMaps are named `<workload>-<container>-file-<hash>`. Relative
/// `source` paths are resolved against the directory of `base_path`. Files
/// which map to the same mount path in different containers are converted
/// separately.
pub fn convert_workload_files(
    workload: &Workload,
    base_path: Option<&str>,
    expander: Option<&dyn Expander>,
    converter: &ContainerFileConverter<'_>,
) -> Result<ConvertedWorkloadFiles> {
    let mut converted = ConvertedWorkloadFiles::default();
    for (container_name, container) in &workload.containers {
        let prefix = format!("{}-{}-", workload.metadata.name, container_name);
        let mut mounts = ContainerFileMounts {
            container: container_name.to_owned(),
            ..ContainerFileMounts::default()
        };
        for (target, file) in container.files.entries() {
            debug!("converting {} in container {}", target, container_name);
            let file = converter
                .convert(target, file, &prefix, base_path, expander)
                .with_context(|| {
                    format!("containers.{}.files[{}]", container_name, target)
                })?;
            if let Some(config_map) = file.config_map {
                converted.config_maps.push(config_map);
            }
            mounts.volumes.push(file.volume);
            mounts.volume_mounts.push(file.mount);
        }
        converted.containers.push(mounts);
    }
    Ok(converted)
}
