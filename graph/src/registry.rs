//! Pass type registry.
//!
//! Maps type names to factories. The registry is filled once and read-only
//! afterwards, so one instance can be shared by every graph and thread.
//!
//! ```ignore
//! let registry = PassRegistry::builder()
//!     .register("Blur", BLUR_SCHEMA, |props| Ok(Box::new(Blur::new(props))))?
//!     .build();
//! let blur = registry.create("Blur", &Properties::new().with("radius", 4))?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{ConstructionError, PassError};
use crate::pass::{validate, ParamSchema, PassBody, PassInstance, RenderPass};
use crate::passes::BuiltinPass;
use crate::types::Properties;

/// Factory for a plugin pass type. Receives validated, default-filled properties.
pub type PluginFactory =
    Arc<dyn Fn(&Properties) -> Result<Box<dyn RenderPass>, PassError> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Builtin(BuiltinPass),
    Plugin(PluginFactory),
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(pass) => write!(f, "Builtin({pass:?})"),
            Self::Plugin(_) => f.write_str("Plugin"),
        }
    }
}

#[derive(Debug, Clone)]
struct PassType {
    schema: Arc<[ParamSchema]>,
    factory: Factory,
}

/// Registered pass types.
#[derive(Debug, Clone, Default)]
pub struct PassRegistry {
    types: BTreeMap<String, PassType>,
}

impl PassRegistry {
    /// Process-wide registry holding the built-in types.
    pub fn global() -> &'static PassRegistry {
        static GLOBAL: OnceLock<PassRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| PassRegistryBuilder::new().build())
    }

    /// Start a registry pre-filled with the built-in types.
    pub fn builder() -> PassRegistryBuilder {
        PassRegistryBuilder::new()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Configuration schema of a type.
    pub fn schema(&self, type_name: &str) -> Option<&[ParamSchema]> {
        self.types.get(type_name).map(|entry| &*entry.schema)
    }

    /// Create a configured pass instance.
    ///
    /// Fails with [`ConstructionError::UnknownPassType`] for unregistered
    /// types and [`ConstructionError::InvalidParameter`] when `props` do not
    /// match the type's schema.
    pub fn create(&self, type_name: &str, props: &Properties) -> Result<PassInstance, ConstructionError> {
        let entry = self
            .types
            .get(type_name)
            .ok_or_else(|| ConstructionError::UnknownPassType {
                type_name: type_name.to_string(),
            })?;
        let props = validate(type_name, &entry.schema, props)?;

        let body = match &entry.factory {
            Factory::Builtin(pass) => pass.instantiate(&props),
            Factory::Plugin(factory) => PassBody::Plugin(factory(&props).map_err(|err| {
                ConstructionError::InvalidParameter {
                    pass_type: type_name.to_string(),
                    option: String::new(),
                    reason: err.to_string(),
                }
            })?),
        };

        log::debug!("PassRegistry: created {type_name} with {} options", props.len());
        Ok(PassInstance::new(type_name, entry.schema.clone(), props, body))
    }
}

/// Builder for a [`PassRegistry`].
#[derive(Debug, Clone)]
pub struct PassRegistryBuilder {
    types: BTreeMap<String, PassType>,
}

impl Default for PassRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PassRegistryBuilder {
    /// Builder with the built-in types registered.
    pub fn new() -> Self {
        let types = BuiltinPass::ALL
            .into_iter()
            .map(|pass| {
                (
                    pass.type_name().to_string(),
                    PassType {
                        schema: Arc::from(pass.schema()),
                        factory: Factory::Builtin(pass),
                    },
                )
            })
            .collect();
        Self { types }
    }

    /// Builder with nothing registered.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Register a plugin pass type.
    pub fn register<F>(
        mut self,
        type_name: impl Into<String>,
        schema: impl Into<Arc<[ParamSchema]>>,
        factory: F,
    ) -> Result<Self, ConstructionError>
    where
        F: Fn(&Properties) -> Result<Box<dyn RenderPass>, PassError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.types.contains_key(&type_name) {
            return Err(ConstructionError::DuplicatePassType { type_name });
        }
        log::debug!("PassRegistry: registered plugin type {type_name}");
        self.types.insert(
            type_name,
            PassType {
                schema: schema.into(),
                factory: Factory::Plugin(Arc::new(factory)),
            },
        );
        Ok(self)
    }

    pub fn build(self) -> PassRegistry {
        PassRegistry { types: self.types }
    }
}
