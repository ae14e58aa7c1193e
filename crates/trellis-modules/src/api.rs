//! Published module APIs.
//!
//! A factory returns a [`ModuleApi`]: a named set of asynchronous operations
//! taking and returning JSON values. Dependents and the publication layer
//! only ever see this object.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::descriptor::ModuleName;
use crate::error::ModuleError;

/// Errors returned by module operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The API has no operation with this name.
    #[error("module '{module}' has no operation '{operation}'")]
    UnknownOperation {
        /// The module called.
        module: String,
        /// The requested operation.
        operation: String,
    },

    /// The arguments did not have the expected shape.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// An engine-level error surfaced inside an operation.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The operation failed.
    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    /// Build an [`OperationError::InvalidArguments`].
    pub fn invalid_arguments(message: impl fmt::Display) -> Self {
        Self::InvalidArguments(message.to_string())
    }

    /// Build an [`OperationError::Failed`].
    pub fn failed(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

/// The future returned by every operation.
pub type OperationFuture = BoxFuture<'static, Result<Value, OperationError>>;

type Operation = Arc<dyn Fn(Value) -> OperationFuture + Send + Sync>;

/// The API object a module publishes.
#[derive(Clone, Default)]
pub struct ModuleApi {
    module: Option<ModuleName>,
    operations: BTreeMap<String, Operation>,
}

impl ModuleApi {
    /// Create an API with no operations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation.
    #[must_use]
    pub fn with_operation<F, Fut>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
    {
        let handler: Operation = Arc::new(move |args: Value| operation(args).boxed());
        self.operations.insert(name.into(), handler);
        self
    }

    /// Invoke an operation.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if no operation has this
    /// name, otherwise whatever the operation returns.
    pub async fn call(&self, operation: &str, args: Value) -> Result<Value, OperationError> {
        let Some(handler) = self.operations.get(operation).cloned() else {
            return Err(OperationError::UnknownOperation {
                module: self.module_label().to_string(),
                operation: operation.to_string(),
            });
        };
        handler(args).await
    }

    /// Whether the API exposes `operation`.
    #[must_use]
    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    /// Operation names, sorted.
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }

    /// The owning module, once instantiated.
    #[must_use]
    pub fn module(&self) -> Option<&ModuleName> {
        self.module.as_ref()
    }

    pub(crate) fn bind(&mut self, module: &ModuleName) {
        self.module = Some(module.clone());
    }

    fn module_label(&self) -> &str {
        self.module.as_ref().map_or("<unbound>", ModuleName::as_str)
    }
}

impl fmt::Debug for ModuleApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleApi")
            .field("module", &self.module)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn echo_api() -> ModuleApi {
        ModuleApi::new()
            .with_operation("echo", |args| async move { Ok(args) })
            .with_operation("fail", |_| async { Err(OperationError::failed("boom")) })
    }

    #[tokio::test]
    async fn test_call_through() {
        let api = echo_api();
        let result = api.call("echo", json!({ "id": 1 })).await.unwrap();
        assert_eq!(result, json!({ "id": 1 }));
    }

    #[tokio::test]
    async fn test_operation_error_propagates() {
        let err = echo_api().call("fail", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_unknown_operation_names_module() {
        let mut api = echo_api();
        api.bind(&ModuleName::new("threads").unwrap());

        let err = api.call("missing", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "module 'threads' has no operation 'missing'");
    }

    #[test]
    fn test_operation_names_sorted() {
        let api = echo_api();
        assert_eq!(api.operation_names(), vec!["echo", "fail"]);
        assert!(api.has_operation("echo"));
        assert!(!api.has_operation("missing"));
        assert!(api.module().is_none());
    }
}
