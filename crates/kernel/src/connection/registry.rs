//! Alias registry for processors and deployers.
//!
//! Populated at startup. Connections name their strategies by alias and the
//! registry turns `{alias, ...options}` into a live instance.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use super::deployer::{FileSystemDeployer, MemoryDeployer, MemoryVolumes};
use super::processor::{JsonProcessor, YamlProcessor};
use super::{ConnectionError, Deployer, Processor, StrategySettings};

/// Factory building a processor from its settings.
pub type ProcessorFactory =
    Arc<dyn Fn(&StrategySettings) -> anyhow::Result<Arc<dyn Processor>> + Send + Sync>;

/// Factory building a deployer from its settings.
pub type DeployerFactory = Arc<
    dyn Fn(&StrategySettings, &DeployerContext) -> anyhow::Result<Arc<dyn Deployer>> + Send + Sync,
>;

/// Process-wide resources handed to deployer factories.
#[derive(Debug, Clone)]
pub struct DeployerContext {
    /// Base directory for relative filesystem deployer paths.
    pub storage_dir: PathBuf,
    /// Shared volumes for the memory deployer.
    pub memory: MemoryVolumes,
}

impl DeployerContext {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            memory: MemoryVolumes::new(),
        }
    }
}

/// Registry of strategy factories keyed by alias.
#[derive(Clone)]
pub struct StrategyRegistry {
    inner: Arc<StrategyRegistryInner>,
}

struct StrategyRegistryInner {
    context: DeployerContext,
    processors: DashMap<String, ProcessorFactory>,
    deployers: DashMap<String, DeployerFactory>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new(context: DeployerContext) -> Self {
        Self {
            inner: Arc::new(StrategyRegistryInner {
                context,
                processors: DashMap::new(),
                deployers: DashMap::new(),
            }),
        }
    }

    /// A registry with every built-in strategy.
    pub fn with_defaults(context: DeployerContext) -> Self {
        let registry = Self::new(context);

        registry.register_processor("json", |_| Ok(Arc::new(JsonProcessor)));
        registry.register_processor("yaml", |_| Ok(Arc::new(YamlProcessor)));

        registry.register_deployer("filesystem", |settings, ctx| {
            Ok(Arc::new(FileSystemDeployer::from_settings(
                settings,
                &ctx.storage_dir,
            )?))
        });
        registry.register_deployer("memory", |settings, ctx| {
            Ok(Arc::new(MemoryDeployer::from_settings(settings, &ctx.memory)?))
        });
        #[cfg(feature = "s3")]
        registry.register_deployer("s3", |settings, _| {
            Ok(Arc::new(super::deployer::S3Deployer::from_settings(
                settings,
            )?))
        });

        registry
    }

    pub fn context(&self) -> &DeployerContext {
        &self.inner.context
    }

    /// Register (or replace) a processor factory.
    pub fn register_processor<F>(&self, alias: &str, factory: F)
    where
        F: Fn(&StrategySettings) -> anyhow::Result<Arc<dyn Processor>> + Send + Sync + 'static,
    {
        self.inner
            .processors
            .insert(alias.to_string(), Arc::new(factory));
    }

    /// Register (or replace) a deployer factory.
    pub fn register_deployer<F>(&self, alias: &str, factory: F)
    where
        F: Fn(&StrategySettings, &DeployerContext) -> anyhow::Result<Arc<dyn Deployer>>
            + Send
            + Sync
            + 'static,
    {
        self.inner
            .deployers
            .insert(alias.to_string(), Arc::new(factory));
    }

    /// Instantiate the processor named by `settings.alias`.
    pub fn processor(
        &self,
        settings: &StrategySettings,
    ) -> Result<Arc<dyn Processor>, ConnectionError> {
        // Clone the factory out so no map guard is held while it runs.
        let factory = self
            .inner
            .processors
            .get(&settings.alias)
            .map(|f| f.value().clone())
            .ok_or_else(|| ConnectionError::UnknownAlias {
                kind: "processor",
                alias: settings.alias.clone(),
            })?;

        factory(settings).map_err(|source| ConnectionError::InvalidSettings {
            kind: "processor",
            alias: settings.alias.clone(),
            source,
        })
    }

    /// Instantiate the deployer named by `settings.alias`.
    pub fn deployer(
        &self,
        settings: &StrategySettings,
    ) -> Result<Arc<dyn Deployer>, ConnectionError> {
        let factory = self
            .inner
            .deployers
            .get(&settings.alias)
            .map(|f| f.value().clone())
            .ok_or_else(|| ConnectionError::UnknownAlias {
                kind: "deployer",
                alias: settings.alias.clone(),
            })?;

        factory(settings, &self.inner.context).map_err(|source| {
            ConnectionError::InvalidSettings {
                kind: "deployer",
                alias: settings.alias.clone(),
                source,
            }
        })
    }

    /// Registered processor aliases, sorted.
    pub fn processor_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .inner
            .processors
            .iter()
            .map(|e| e.key().clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// Registered deployer aliases, sorted.
    pub fn deployer_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .inner
            .deployers
            .iter()
            .map(|e| e.key().clone())
            .collect();
        aliases.sort();
        aliases
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("processors", &self.processor_aliases())
            .field("deployers", &self.deployer_aliases())
            .finish()
    }
}
