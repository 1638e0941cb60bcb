//! Process-wide registry of template units.
//!
//! Every template registers itself on construction. The registry only keeps
//! [`Weak`] handles in an index-keyed table: it observes units, it never keeps
//! one alive. It also carries the two live-reload settings every unit consults
//! on render: the live-reload flag and the script fragment to inject.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::TemplateError;

/// A unit the registry can load.
pub trait Loadable: Send + Sync {
    /// Parse and trial-render against the unit's sample data.
    fn load(&self) -> Result<(), TemplateError>;
}

/// Index of a unit in the registry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub usize);

/// Registry state. The process uses one global instance through the free
/// functions of this module.
#[derive(Default)]
pub struct Registry {
    units: Mutex<Vec<Weak<dyn Loadable>>>,
    live_reload: AtomicBool,
    injected_script: RwLock<Arc<[u8]>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, unit: Weak<dyn Loadable>) -> UnitId {
        let mut units = self.units.lock();
        units.push(unit);
        UnitId(units.len() - 1)
    }

    /// Load every live unit in registration order, stopping at the first failure.
    pub fn load_all(&self) -> Result<(), TemplateError> {
        // Snapshot so a unit constructed during load cannot deadlock the table
        let units: Vec<_> = self.units.lock().iter().filter_map(Weak::upgrade).collect();
        for unit in units {
            unit.load()?;
        }
        Ok(())
    }

    /// Number of units still alive.
    pub fn len(&self) -> usize {
        self.units
            .lock()
            .iter()
            .filter(|u| u.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all units and restore the default settings.
    pub fn reset(&self) {
        self.units.lock().clear();
        self.live_reload.store(false, Ordering::SeqCst);
        *self.injected_script.write() = Arc::from(Vec::new());
    }

    pub fn set_live_reload(&self, enabled: bool) {
        self.live_reload.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live_reload(&self) -> bool {
        self.live_reload.load(Ordering::SeqCst)
    }

    pub fn set_injected_script(&self, script: impl Into<Vec<u8>>) {
        *self.injected_script.write() = Arc::from(script.into());
    }

    pub fn injected_script(&self) -> Arc<[u8]> {
        Arc::clone(&self.injected_script.read())
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The global registry.
pub fn global() -> &'static Registry {
    &REGISTRY
}

pub fn add(unit: Weak<dyn Loadable>) -> UnitId {
    REGISTRY.add(unit)
}

/// Load and validate every registered template.
///
/// Meant to be called once at startup, after all templates are declared;
/// an error here should abort startup.
pub fn load_all() -> Result<(), TemplateError> {
    let count = REGISTRY.len();
    REGISTRY.load_all()?;
    crate::debug!("load"; "validated {} template{}", count, if count == 1 { "" } else { "s" });
    Ok(())
}

/// Forget all registered templates (tests).
pub fn reset() {
    REGISTRY.reset();
}

pub fn set_live_reload(enabled: bool) {
    REGISTRY.set_live_reload(enabled);
}

pub fn is_live_reload() -> bool {
    REGISTRY.is_live_reload()
}

pub fn set_injected_script(script: impl Into<Vec<u8>>) {
    REGISTRY.set_injected_script(script);
}

pub fn injected_script() -> Arc<[u8]> {
    REGISTRY.injected_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        order: Arc<Mutex<Vec<usize>>>,
        id: usize,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Loadable for Probe {
        fn load(&self) -> Result<(), TemplateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().push(self.id);
            if self.fail {
                return Err(TemplateError {
                    base_patterns: vec![],
                    extra_patterns: vec![],
                    pattern: format!("probe-{}", self.id),
                    source: LoadError::NoPatternsProvided,
                });
            }
            Ok(())
        }
    }

    fn probe(order: &Arc<Mutex<Vec<usize>>>, id: usize, fail: bool) -> Arc<dyn Loadable> {
        Arc::new(Probe {
            order: Arc::clone(order),
            id,
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_load_all_in_registration_order() {
        let registry = Registry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let units: Vec<_> = (0..3).map(|i| probe(&order, i, false)).collect();
        for unit in &units {
            registry.add(Arc::downgrade(unit));
        }

        registry.load_all().unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_load_all_fails_fast() {
        let registry = Registry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let units = [
            probe(&order, 0, false),
            probe(&order, 1, true),
            probe(&order, 2, false),
        ];
        for unit in &units {
            registry.add(Arc::downgrade(unit));
        }

        let err = registry.load_all().unwrap_err();
        assert_eq!(err.pattern, "probe-1");
        assert_eq!(*order.lock(), vec![0, 1]);

        // Same outcome on a second run
        let again = registry.load_all().unwrap_err();
        assert_eq!(again.to_string(), err.to_string());
    }

    #[test]
    fn test_registry_does_not_own_units() {
        let registry = Registry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let kept = probe(&order, 0, false);
        let dropped = probe(&order, 1, true);
        let id0 = registry.add(Arc::downgrade(&kept));
        let id1 = registry.add(Arc::downgrade(&dropped));
        assert_eq!((id0, id1), (UnitId(0), UnitId(1)));
        drop(dropped);

        assert_eq!(registry.len(), 1);
        registry.load_all().unwrap();
        assert_eq!(*order.lock(), vec![0]);
    }

    #[test]
    fn test_settings_and_reset() {
        let registry = Registry::new();
        assert!(!registry.is_live_reload());
        assert!(registry.injected_script().is_empty());

        registry.set_live_reload(true);
        registry.set_injected_script("<script></script>");
        assert!(registry.is_live_reload());
        assert_eq!(&*registry.injected_script(), b"<script></script>");

        registry.reset();
        assert!(!registry.is_live_reload());
        assert!(registry.injected_script().is_empty());
        assert!(registry.is_empty());
    }
}
