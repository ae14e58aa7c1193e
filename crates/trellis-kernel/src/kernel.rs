use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, info_span};
use trellis_events::{EventBus, EventMetadata, TrellisEvent};
use trellis_modules::{
    AdapterRegistry, ApiPublisher, CapabilitySource, DiscoveredModule, InjectionContext,
    InstanceTable, ModuleApi, ModuleName, ModuleRegistry, NoopPublisher, ScopedEmitter, SourceSet,
    discover, instantiate_module, resolve_dependencies, validate_all,
};
use uuid::Uuid;

use crate::config::BootConfig;
use crate::error::{KernelError, KernelResult};
use crate::state::BootState;

/// Event source name for lifecycle events.
const KERNEL_SOURCE: &str = "kernel";

/// Boots a set of module sources into live, published APIs.
///
/// A kernel boots at most once. After a successful boot its registries and
/// instance table are frozen and [`get_module`](Self::get_module) serves
/// lookups; after a failed boot the partial state stays inspectable.
pub struct Kernel {
    config: BootConfig,
    capabilities: CapabilitySource,
    publisher: Arc<dyn ApiPublisher>,
    event_bus: EventBus,
    state: BootState,
    registry: ModuleRegistry,
    adapters: AdapterRegistry,
    instances: InstanceTable,
    boot_id: Uuid,
}

impl Kernel {
    /// Create a kernel that publishes through a [`NoopPublisher`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Config`] if `config` fails validation.
    pub fn new(config: BootConfig, capabilities: CapabilitySource) -> KernelResult<Self> {
        config.validate()?;
        let event_bus = EventBus::with_capacity(config.event_capacity);
        Ok(Self {
            config,
            capabilities,
            publisher: Arc::new(NoopPublisher),
            event_bus,
            state: BootState::Created,
            registry: ModuleRegistry::new(),
            adapters: AdapterRegistry::new(),
            instances: InstanceTable::new(),
            boot_id: Uuid::new_v4(),
        })
    }

    /// Hand every instantiated API to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn ApiPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Run the boot sequence over `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::AlreadyBooted`] unless the kernel is freshly
    /// created. Any stage failure moves the kernel to [`BootState::Failed`]
    /// and is returned unchanged.
    pub fn boot(&mut self, sources: SourceSet) -> KernelResult<()> {
        if self.state != BootState::Created {
            return Err(KernelError::AlreadyBooted {
                state: self.state.to_string(),
            });
        }

        let span = info_span!("boot", boot_id = %self.boot_id);
        let _enter = span.enter();

        match self.run(sources) {
            Ok(()) => {
                let order: Vec<String> = self
                    .instances
                    .names()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                info!(count = order.len(), "Boot complete");
                self.state = BootState::Booted;
                self.event_bus.publish(TrellisEvent::BootCompleted {
                    metadata: self.lifecycle_metadata(),
                    order,
                });
                Ok(())
            },
            Err(e) => {
                let stage = self.state.pending_stage().to_string();
                let reason = e.to_string();
                error!(stage = %stage, error = %reason, "Boot failed");
                self.state = BootState::Failed {
                    stage: stage.clone(),
                    reason: reason.clone(),
                };
                self.event_bus.publish(TrellisEvent::BootFailed {
                    metadata: self.lifecycle_metadata(),
                    stage,
                    reason,
                });
                Err(e)
            },
        }
    }

    fn run(&mut self, sources: SourceSet) -> KernelResult<()> {
        // 1. Discovery
        let discovered = discover(sources)?;
        self.state = BootState::Discovered;

        // 2. Governance over the whole set, before anything is registered
        validate_all(&discovered)?;
        self.state = BootState::Validated;
        info!(count = discovered.len(), "Capability governance passed");

        // 3. Registration
        for module in discovered {
            let DiscoveredModule {
                name,
                definition,
                adapters,
                ..
            } = module;
            self.adapters.register(name.clone(), adapters)?;
            self.registry.register(name, definition)?;
        }
        self.state = BootState::Registered;

        // 4. Resolution
        let order = resolve_dependencies(&self.registry)?;
        self.state = BootState::Resolved;
        let joined = order
            .iter()
            .map(ModuleName::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        info!(order = %joined, "Resolved instantiation order");

        // 5. Instantiation, one module at a time
        let ctx = InjectionContext {
            data_root: self.config.data_root.clone(),
            capabilities: &self.capabilities,
            adapters: &self.adapters,
        };
        for (index, name) in order.iter().enumerate() {
            self.state = BootState::Instantiating {
                index,
                module: name.to_string(),
            };

            let descriptor =
                self.registry
                    .get(name.as_str())
                    .ok_or_else(|| KernelError::UnregisteredModule {
                        module: name.to_string(),
                    })?;
            let emitter = ScopedEmitter::new(
                name.clone(),
                descriptor.declared_events(),
                self.event_bus.clone(),
            );
            let instance = instantiate_module(descriptor, &ctx, &self.instances, emitter)?;

            self.publisher
                .publish(&instance.name, Arc::clone(&instance.api))
                .map_err(|source| KernelError::Publish {
                    module: name.to_string(),
                    source,
                })?;
            debug!(module = %name, "Published module API");

            self.event_bus.publish(TrellisEvent::ModuleInstantiated {
                metadata: self.lifecycle_metadata(),
                module: name.to_string(),
                operations: instance.api.operation_names(),
            });
            self.instances.insert(instance.name, instance.api)?;
        }

        Ok(())
    }

    fn lifecycle_metadata(&self) -> EventMetadata {
        EventMetadata::new(KERNEL_SOURCE).with_correlation_id(self.boot_id)
    }

    /// The API of an instantiated module.
    ///
    /// Repeated calls return the same `Arc`.
    #[must_use]
    pub fn get_module(&self, name: &str) -> Option<Arc<ModuleApi>> {
        self.instances.get(name)
    }

    /// Current boot state.
    #[must_use]
    pub fn state(&self) -> &BootState {
        &self.state
    }

    /// Modules instantiated so far, in instantiation order.
    #[must_use]
    pub fn instantiation_order(&self) -> &[ModuleName] {
        self.instances.names()
    }

    /// Registered module descriptors.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Registered adapters.
    #[must_use]
    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// The bus carrying module and lifecycle events.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// The configuration this kernel was created with.
    #[must_use]
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Correlation id stamped on this kernel's lifecycle events.
    #[must_use]
    pub fn boot_id(&self) -> Uuid {
        self.boot_id
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("state", &self.state)
            .field("boot_id", &self.boot_id)
            .field("modules", &self.registry.len())
            .field("instantiated", &self.instances.len())
            .finish_non_exhaustive()
    }
}
