//! Code shared between the `kubefile` tools: converting container file
//! declarations into Kubernetes ConfigMaps, Secret volumes and mounts.

#![warn(missing_docs)]

pub use anyhow;
pub use serde_json;
pub use serde_yaml;

pub mod errors;
pub mod expand;
pub mod files;
pub mod fs;
pub mod k8s;
pub mod lexical_path;
pub mod manifest;
pub mod naming;
pub mod placeholders;
pub mod secret;
pub mod tracing_support;
pub mod workload;

/// Common imports used by many modules.
pub mod prelude {
    pub use anyhow::{format_err, Context as _};
    pub use serde::{Deserialize, Serialize};
    pub use std::{
        collections::BTreeMap,
        fmt,
        path::{Path, PathBuf},
    };
    pub use tracing::{debug, error, info, trace, warn};

    pub use super::{Error, Result};
}

/// Error type for this crate's functions.
pub use anyhow::Error;

/// Result type for this crate's functions.
pub type Result<T, E = Error> = std::result::Result<T, E>;
