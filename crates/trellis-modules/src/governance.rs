//! Capability governance.
//!
//! Every capability a module declares must be routed through one of its own
//! adapters, and every adapter must correspond to a declared capability.
//! Boot runs these checks over the full discovered set and aborts with one
//! aggregated report before anything is instantiated.

use std::fmt;

use crate::adapter::AdapterSet;
use crate::discovery::DiscoveredModule;
use crate::error::{ModuleError, ModuleResult};

/// Which direction of the declaration/adapter correspondence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A declared capability has no adapter.
    MissingAdapter,
    /// An adapter exists for a capability that was not declared.
    OrphanAdapter,
}

/// One broken declaration/adapter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceViolation {
    /// The offending module.
    pub module: String,
    /// Which direction failed.
    pub kind: ViolationKind,
    /// The capability name involved.
    pub capability: String,
}

impl fmt::Display for GovernanceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MissingAdapter => write!(
                f,
                "module '{}' declares capability '{}' but has no '{}' adapter",
                self.module, self.capability, self.capability
            ),
            ViolationKind::OrphanAdapter => write!(
                f,
                "module '{}' has an adapter for '{}' but does not declare that capability",
                self.module, self.capability
            ),
        }
    }
}

/// Every violation found across the discovered modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernanceReport {
    violations: Vec<GovernanceViolation>,
}

impl GovernanceReport {
    /// Wrap a list of violations.
    #[must_use]
    pub fn new(violations: Vec<GovernanceViolation>) -> Self {
        Self { violations }
    }

    /// The violations, grouped by module in discovery order.
    #[must_use]
    pub fn violations(&self) -> &[GovernanceViolation] {
        &self.violations
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether the report is clean.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for GovernanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capability governance failed with {} violation(s)",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

/// Check one module's declarations against its adapters.
///
/// Returns an empty list when the declared capability names and the
/// adapter-covered names are exactly equal.
#[must_use]
pub fn validate_module(module: &DiscoveredModule) -> Vec<GovernanceViolation> {
    check_correspondence(
        module.name.as_str(),
        &module.definition.manifest().required_capabilities,
        &module.adapters,
    )
}

/// Check every module and fail with one report covering all of them.
///
/// # Errors
///
/// Returns [`ModuleError::Governance`] if any module has a violation.
pub fn validate_all(modules: &[DiscoveredModule]) -> ModuleResult<()> {
    let violations: Vec<_> = modules.iter().flat_map(validate_module).collect();
    if violations.is_empty() {
        return Ok(());
    }
    Err(ModuleError::Governance(GovernanceReport::new(violations)))
}

fn check_correspondence(
    module: &str,
    declared: &[String],
    adapters: &AdapterSet,
) -> Vec<GovernanceViolation> {
    let missing = declared
        .iter()
        .filter(|capability| !adapters.contains(capability))
        .map(|capability| GovernanceViolation {
            module: module.to_string(),
            kind: ViolationKind::MissingAdapter,
            capability: capability.clone(),
        });

    let orphans = adapters
        .capabilities()
        .filter(|capability| !declared.iter().any(|d| d.as_str() == *capability))
        .map(|capability| GovernanceViolation {
            module: module.to_string(),
            kind: ViolationKind::OrphanAdapter,
            capability: capability.to_string(),
        });

    missing.chain(orphans).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::adapter::CapabilityAdapter;
    use crate::api::ModuleApi;
    use crate::descriptor::{ModuleDefinition, ModuleName};
    use crate::manifest::ModuleManifest;

    fn discovered(name: &str, declared: &[&str], adapted: &[&str]) -> DiscoveredModule {
        let manifest = declared
            .iter()
            .fold(ModuleManifest::new(), |m, c| m.capability(*c));
        let adapters = adapted.iter().fold(AdapterSet::new(), |set, c| {
            set.with(*c, CapabilityAdapter::passthrough())
        });
        DiscoveredModule {
            name: ModuleName::new(name).unwrap(),
            definition: ModuleDefinition::new(manifest, |_| Ok(ModuleApi::new())).unwrap(),
            adapters,
            source: format!("modules/{name}/module").into(),
        }
    }

    #[test]
    fn test_matching_module_is_valid() {
        let module = discovered("threads", &["jsonFile", "logger"], &["logger", "jsonFile"]);
        assert!(validate_module(&module).is_empty());
    }

    #[test]
    fn test_missing_adapter() {
        let module = discovered("threads", &["jsonFile"], &[]);
        let violations = validate_module(&module);
        assert_eq!(
            violations,
            vec![GovernanceViolation {
                module: "threads".into(),
                kind: ViolationKind::MissingAdapter,
                capability: "jsonFile".into(),
            }]
        );
        assert!(violations[0].to_string().contains("no 'jsonFile' adapter"));
    }

    #[test]
    fn test_orphan_adapter() {
        let module = discovered("threads", &[], &["http"]);
        let violations = validate_module(&module);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::OrphanAdapter);
    }

    #[test]
    fn test_validate_all_aggregates_every_module() {
        let modules = vec![
            discovered("a", &["jsonFile"], &[]),
            discovered("b", &["logger"], &["logger"]),
            discovered("c", &[], &["http", "glob"]),
        ];

        let err = validate_all(&modules).unwrap_err();
        let ModuleError::Governance(report) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(report.len(), 3);

        let message = err.to_string();
        assert!(message.contains("3 violation(s)"));
        assert!(message.contains("module 'a' declares capability 'jsonFile'"));
        assert!(message.contains("module 'c' has an adapter for 'glob'"));
        assert!(message.contains("module 'c' has an adapter for 'http'"));
    }

    #[test]
    fn test_validate_all_ok() {
        let modules = vec![discovered("a", &["http"], &["http"]), discovered("b", &[], &[])];
        assert!(validate_all(&modules).is_ok());
    }

    const NAMES: [&str; 6] = ["jsonFile", "appendLog", "archive", "glob", "logger", "http"];

    proptest! {
        #[test]
        fn prop_empty_iff_sets_equal(
            declared in proptest::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len()),
            adapted in proptest::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len()),
        ) {
            let module = discovered("m", &declared, &adapted);
            let violations = validate_module(&module);

            let declared_set: BTreeSet<_> = declared.iter().copied().collect();
            let adapted_set: BTreeSet<_> = adapted.iter().copied().collect();
            prop_assert_eq!(violations.is_empty(), declared_set == adapted_set);

            let expected = declared_set.symmetric_difference(&adapted_set).count();
            prop_assert_eq!(violations.len(), expected);
        }
    }
}
