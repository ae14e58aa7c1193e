//! Per-module instantiation: capability resolution and factory invocation.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::ModuleApi;
use crate::capability::{CapabilityBundle, CapabilityKind, CapabilitySlot, CapabilitySource};
use crate::descriptor::{FactoryContext, ModuleDescriptor, ModuleName};
use crate::emitter::ScopedEmitter;
use crate::error::{ModuleError, ModuleResult};
use crate::instance::InstanceTable;
use crate::registry::AdapterRegistry;

/// What the injector needs beyond the descriptor itself.
#[derive(Debug)]
pub struct InjectionContext<'a> {
    /// Root directory handed to path-scoped capability factories.
    pub data_root: PathBuf,
    /// Supplies raw capabilities.
    pub capabilities: &'a CapabilitySource,
    /// Registered adapters for every module.
    pub adapters: &'a AdapterRegistry,
}

/// A freshly built module.
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    /// The module name.
    pub name: ModuleName,
    /// The API its factory returned, bound to the module.
    pub api: Arc<ModuleApi>,
}

/// Resolve every capability `descriptor` declares, in declaration order.
///
/// # Errors
///
/// - [`ModuleError::UnknownCapability`] for a name outside the capability table.
/// - [`ModuleError::CapabilityUnavailable`] if the source does not supply a known kind.
/// - [`ModuleError::CapabilityFactoryFailed`] if a path-scoped factory fails.
/// - [`ModuleError::AdapterFailed`] if the module's adapter rejects the raw capability.
pub fn resolve_capabilities(
    descriptor: &ModuleDescriptor,
    ctx: &InjectionContext<'_>,
) -> ModuleResult<CapabilityBundle> {
    let module = descriptor.name();
    let mut bundle = CapabilityBundle::new(module.clone());

    for name in descriptor.required_capabilities() {
        let kind = CapabilityKind::from_name(name).ok_or_else(|| ModuleError::UnknownCapability {
            module: module.to_string(),
            capability: name.clone(),
        })?;

        let raw = match ctx.capabilities.slot(kind) {
            Some(CapabilitySlot::PathScoped(factory)) => {
                factory(&ctx.data_root, descriptor.storage_paths()).map_err(|source| {
                    ModuleError::CapabilityFactoryFailed {
                        module: module.to_string(),
                        capability: name.clone(),
                        source,
                    }
                })?
            },
            Some(CapabilitySlot::Shared(instance)) => Arc::clone(instance),
            None => {
                return Err(ModuleError::CapabilityUnavailable {
                    module: module.to_string(),
                    capability: name.clone(),
                });
            },
        };

        let capability = match ctx.adapters.adapter(module.as_str(), name) {
            Some(adapter) => adapter
                .apply(raw)
                .map_err(|source| ModuleError::AdapterFailed {
                    module: module.to_string(),
                    capability: name.clone(),
                    source,
                })?,
            None => raw,
        };

        debug!(
            module = %module,
            capability = %kind,
            path_scoped = kind.is_path_scoped(),
            "Resolved capability"
        );
        bundle.insert(name.clone(), capability);
    }

    Ok(bundle)
}

/// Build one module.
///
/// Every dependency must already be in `instances`; the caller is
/// responsible for walking modules in resolved order.
///
/// # Errors
///
/// Any error from [`resolve_capabilities`], a
/// [`ModuleError::DependencyNotInstantiated`] for an absent dependency, or
/// whatever the factory returns.
pub fn instantiate_module(
    descriptor: &ModuleDescriptor,
    ctx: &InjectionContext<'_>,
    instances: &InstanceTable,
    emitter: ScopedEmitter,
) -> ModuleResult<ModuleInstance> {
    let module = descriptor.name();

    // 1. Capabilities, narrowed through the module's adapters
    let capabilities = resolve_capabilities(descriptor, ctx)?;

    // 2. Dependency APIs, re-checked against the instance table
    let dependencies = instances.dependency_apis(module, descriptor.required_modules())?;

    // 3. Factory
    let mut api = descriptor.build(FactoryContext {
        module: module.clone(),
        dependencies,
        capabilities,
        emitter,
    })?;
    api.bind(module);

    info!(
        module = %module,
        operations = api.operation_names().len(),
        "Instantiated module"
    );
    Ok(ModuleInstance {
        name: module.clone(),
        api: Arc::new(api),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use serde_json::{Value, json};
    use trellis_events::EventBus;

    use super::*;
    use crate::adapter::{AdapterSet, CapabilityAdapter};
    use crate::api::OperationError;
    use crate::capability::{CapabilityError, capability};
    use crate::descriptor::ModuleDefinition;
    use crate::manifest::ModuleManifest;

    #[derive(Debug)]
    struct Store {
        root: PathBuf,
    }

    #[derive(Debug)]
    struct Http;

    fn source() -> CapabilitySource {
        let mut source = CapabilitySource::new();
        source
            .register_path_scoped(CapabilityKind::JsonFile, |root: &Path, prefixes: &[String]| {
                let prefix = prefixes.first().cloned().unwrap_or_default();
                Ok(capability(Store {
                    root: root.join(prefix),
                }))
            })
            .unwrap()
            .register_shared(CapabilityKind::Http, capability(Http))
            .unwrap();
        source
    }

    fn descriptor<F>(name: &str, manifest: ModuleManifest, factory: F) -> ModuleDescriptor
    where
        F: Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync + 'static,
    {
        ModuleDescriptor::new(
            ModuleName::new(name).unwrap(),
            ModuleDefinition::new(manifest, factory).unwrap(),
        )
    }

    fn emitter(descriptor: &ModuleDescriptor) -> ScopedEmitter {
        ScopedEmitter::new(
            descriptor.name().clone(),
            descriptor.declared_events(),
            EventBus::new(),
        )
    }

    fn adapter_registry(module: &str, set: AdapterSet) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry
            .register(ModuleName::new(module).unwrap(), set)
            .unwrap();
        registry
    }

    #[test]
    fn test_path_scoped_capability_uses_storage_paths() {
        let descriptor = descriptor(
            "threads",
            ModuleManifest::new()
                .capability("jsonFile")
                .storage_path("threads"),
            |_| Ok(ModuleApi::new()),
        );
        let source = source();
        let adapters = adapter_registry(
            "threads",
            AdapterSet::new().with("jsonFile", CapabilityAdapter::passthrough()),
        );
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };

        let bundle = resolve_capabilities(&descriptor, &ctx).unwrap();
        let store = bundle.get::<Store>("jsonFile").unwrap();
        assert_eq!(store.root, Path::new("/data/threads"));
    }

    #[test]
    fn test_adapter_applied() {
        let descriptor = descriptor(
            "net",
            ModuleManifest::new().capability("http"),
            |_| Ok(ModuleApi::new()),
        );
        let source = source();
        let adapters = adapter_registry(
            "net",
            AdapterSet::new().with(
                "http",
                CapabilityAdapter::map(|_: Arc<Http>| Ok("narrowed".to_string())),
            ),
        );
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };

        let bundle = resolve_capabilities(&descriptor, &ctx).unwrap();
        assert_eq!(*bundle.get::<String>("http").unwrap(), "narrowed");
    }

    #[test]
    fn test_unknown_and_unavailable_capabilities() {
        let source = source();
        let adapters = AdapterRegistry::new();
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };

        let unknown = descriptor(
            "a",
            ModuleManifest::new().capability("teleport"),
            |_| Ok(ModuleApi::new()),
        );
        assert!(matches!(
            resolve_capabilities(&unknown, &ctx).unwrap_err(),
            ModuleError::UnknownCapability { .. }
        ));

        let unavailable = descriptor(
            "b",
            ModuleManifest::new().capability("glob"),
            |_| Ok(ModuleApi::new()),
        );
        assert!(matches!(
            resolve_capabilities(&unavailable, &ctx).unwrap_err(),
            ModuleError::CapabilityUnavailable { .. }
        ));
    }

    #[test]
    fn test_factory_and_adapter_failures() {
        let mut failing = CapabilitySource::new();
        failing
            .register_path_scoped(CapabilityKind::AppendLog, |_, _| {
                Err(CapabilityError::failed("disk full"))
            })
            .unwrap();
        let adapters = AdapterRegistry::new();
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &failing,
            adapters: &adapters,
        };
        let log = descriptor(
            "log",
            ModuleManifest::new().capability("appendLog"),
            |_| Ok(ModuleApi::new()),
        );
        let err = resolve_capabilities(&log, &ctx).unwrap_err();
        assert!(err.to_string().contains("disk full"));

        let source = source();
        let adapters = adapter_registry(
            "net",
            AdapterSet::new().with(
                "http",
                CapabilityAdapter::new(|_| Err(CapabilityError::failed("bad adapter"))),
            ),
        );
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };
        let net = descriptor(
            "net",
            ModuleManifest::new().capability("http"),
            |_| Ok(ModuleApi::new()),
        );
        assert!(matches!(
            resolve_capabilities(&net, &ctx).unwrap_err(),
            ModuleError::AdapterFailed { .. }
        ));
    }

    #[test]
    fn test_undeclared_capability_read_aborts_factory() {
        let reached_end = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached_end);
        let descriptor = descriptor("e", ModuleManifest::new(), move |ctx| {
            ctx.capabilities.get_raw("undeclaredThing")?;
            *flag.lock().unwrap() = true;
            Ok(ModuleApi::new())
        });
        let source = source();
        let adapters = AdapterRegistry::new();
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };

        let err = instantiate_module(
            &descriptor,
            &ctx,
            &InstanceTable::new(),
            emitter(&descriptor),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "module 'e' accessed undeclared capability 'undeclaredThing'"
        );
        assert!(!*reached_end.lock().unwrap());
    }

    #[tokio::test]
    async fn test_dependency_api_call_through() {
        let source = source();
        let adapters = AdapterRegistry::new();
        let ctx = InjectionContext {
            data_root: PathBuf::from("/data"),
            capabilities: &source,
            adapters: &adapters,
        };
        let mut instances = InstanceTable::new();

        let a = descriptor("a", ModuleManifest::new(), |_| {
            Ok(ModuleApi::new().with_operation("ping", |_| async { Ok(json!("pong")) }))
        });
        let a_instance = instantiate_module(&a, &ctx, &instances, emitter(&a)).unwrap();
        instances
            .insert(a_instance.name.clone(), Arc::clone(&a_instance.api))
            .unwrap();

        let b = descriptor("b", ModuleManifest::new().depends_on("a"), |ctx| {
            let a = ctx.dependencies.get("a")?;
            Ok(ModuleApi::new().with_operation("relay", move |args: Value| {
                let a = Arc::clone(&a);
                async move { a.call("ping", args).await }
            }))
        });
        let b_instance = instantiate_module(&b, &ctx, &instances, emitter(&b)).unwrap();

        assert_eq!(b_instance.api.module().unwrap().as_str(), "b");
        let result = b_instance.api.call("relay", Value::Null).await.unwrap();
        assert_eq!(result, json!("pong"));

        let missing = descriptor("c", ModuleManifest::new().depends_on("zzz"), |_| {
            Err(ModuleError::factory("c", OperationError::failed("unreachable")))
        });
        assert!(matches!(
            instantiate_module(&missing, &ctx, &instances, emitter(&missing)).unwrap_err(),
            ModuleError::DependencyNotInstantiated { .. }
        ));
    }
}
