//! Declarative graph descriptions.
//!
//! A graph can be written as TOML and built through the same validated
//! operations as a graph assembled in code:
//!
//! ```toml
//! name = "TestPathTracer"
//! outputs = ["AccumulatePass.output"]
//!
//! [[pass]]
//! name = "GBufferRT"
//! type = "GBufferRT"
//! params = { samplePattern = "Stratified", sampleCount = 16 }
//!
//! [[edge]]
//! from = "GBufferRT.vbuffer"
//! to = "PathTracer.vbuffer"
//! ```
//!
//! Building applies passes, then edges, then outputs, and stops at the first
//! rejected operation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;
use crate::executor::ExecutorConfig;
use crate::graph::RenderGraph;
use crate::registry::PassRegistry;
use crate::types::Properties;

/// Errors reported while loading or saving a graph description.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read graph description {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse graph description{}: {source}", located(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize graph description: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid graph description{}: {source}", located(.path))]
    Construction {
        path: Option<PathBuf>,
        #[source]
        source: ConstructionError,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

/// One pass in a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub pass_type: String,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub params: Properties,
}

/// One edge in a description, as `"Pass.port"` paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDescription {
    pub from: String,
    pub to: String,
}

/// A complete graph description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDescription {
    pub name: String,
    /// Marked outputs, as `"Pass.port"` paths.
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, rename = "pass")]
    pub passes: Vec<PassDescription>,
    #[serde(default, rename = "edge")]
    pub edges: Vec<EdgeDescription>,
    /// File the description was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl GraphDescription {
    pub fn from_toml_str(text: &str) -> Result<Self, LoadError> {
        toml::from_str(text).map_err(|source| LoadError::Parse { path: None, source })
    }

    pub fn to_toml_string(&self) -> Result<String, LoadError> {
        Ok(toml::to_string(self)?)
    }

    /// Read a description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut description: Self = toml::from_str(&text).map_err(|source| LoadError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        description.source = Some(path.to_path_buf());
        Ok(description)
    }

    /// Write the description to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a graph from the description.
    pub fn build(&self, registry: &PassRegistry, config: ExecutorConfig) -> Result<RenderGraph, LoadError> {
        let wrap = |source: ConstructionError| LoadError::Construction {
            path: self.source.clone(),
            source,
        };

        let mut graph = RenderGraph::with_config(self.name.as_str(), config);
        for pass in &self.passes {
            graph
                .create_pass(registry, &pass.pass_type, pass.name.as_str(), &pass.params)
                .map_err(wrap)?;
        }
        for edge in &self.edges {
            graph.add_edge(&edge.from, &edge.to).map_err(wrap)?;
        }
        for output in &self.outputs {
            graph.mark_output(output).map_err(wrap)?;
        }

        log::info!(
            "Loaded graph '{}' ({} passes, {} edges, {} outputs)",
            self.name,
            self.passes.len(),
            self.edges.len(),
            self.outputs.len()
        );
        Ok(graph)
    }

    /// Describe an existing graph.
    ///
    /// Options equal to their schema default are left out.
    pub fn from_graph(graph: &RenderGraph) -> Self {
        let passes = graph
            .passes()
            .map(|(name, instance)| {
                let params = instance
                    .properties()
                    .iter()
                    .filter(|(option, value)| {
                        instance
                            .schema()
                            .iter()
                            .find(|entry| entry.name == *option)
                            .is_none_or(|entry| entry.default.to_value() != **value)
                    })
                    .map(|(option, value)| (option.to_string(), value.clone()))
                    .collect();
                PassDescription {
                    name: name.to_string(),
                    pass_type: instance.type_name().to_string(),
                    params,
                }
            })
            .collect();

        Self {
            name: graph.name().to_string(),
            outputs: graph
                .marked_outputs()
                .iter()
                .map(ToString::to_string)
                .collect(),
            passes,
            edges: graph
                .edges()
                .iter()
                .map(|edge| EdgeDescription {
                    from: edge.src().to_string(),
                    to: edge.dst().to_string(),
                })
                .collect(),
            source: None,
        }
    }
}

impl RenderGraph {
    /// Describe this graph for saving.
    pub fn to_description(&self) -> GraphDescription {
        GraphDescription::from_graph(self)
    }
}
