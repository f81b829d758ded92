//! Process-wide engine selection.
//!
//! The engine is chosen once per process, on first use, from the
//! `LIGHTKV_ENGINE` environment variable. Each candidate sits behind an
//! [`EngineProbe`]; an unknown or unavailable name falls back to the first
//! probe that succeeds. Tests that need a specific engine bypass the global
//! with [`crate::Environment::open_with_engine`].

use lightkv_engine::{Engine, EngineVersion, MemoryEngine};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment variable naming the engine to use.
pub const ENGINE_ENV_VAR: &str = "LIGHTKV_ENGINE";

/// A candidate engine.
pub trait EngineProbe: Send + Sync {
    /// Name matched against [`ENGINE_ENV_VAR`].
    fn name(&self) -> &'static str;

    /// Instantiates the engine, or `None` if it is unavailable here.
    fn probe(&self) -> Option<Arc<dyn Engine>>;
}

/// Probe for the in-process [`MemoryEngine`]. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProbe;

impl EngineProbe for MemoryProbe {
    fn name(&self) -> &'static str {
        MemoryEngine::NAME
    }

    fn probe(&self) -> Option<Arc<dyn Engine>> {
        Some(Arc::new(MemoryEngine::new()))
    }
}

/// The engine chosen for this process.
#[derive(Clone)]
pub struct EngineSelection {
    /// The engine instance shared by every environment opened through it.
    pub engine: Arc<dyn Engine>,
    /// Engine name.
    pub name: &'static str,
    /// Engine version reported at selection time.
    pub version: EngineVersion,
}

impl fmt::Debug for EngineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSelection")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}

impl EngineSelection {
    fn from_engine(engine: Arc<dyn Engine>) -> Self {
        Self {
            name: engine.name(),
            version: engine.version(),
            engine,
        }
    }
}

/// Picks an engine: the probe named `requested` if it succeeds, otherwise
/// the first probe that does, otherwise [`MemoryEngine`].
pub fn select_engine(requested: Option<&str>, probes: &[&dyn EngineProbe]) -> EngineSelection {
    if let Some(name) = requested {
        let wanted = probes
            .iter()
            .find(|probe| probe.name().eq_ignore_ascii_case(name))
            .and_then(|probe| probe.probe());
        match wanted {
            Some(engine) => return EngineSelection::from_engine(engine),
            None => warn!(requested = name, "requested engine is unavailable, falling back"),
        }
    }

    let engine = probes
        .iter()
        .find_map(|probe| probe.probe())
        .unwrap_or_else(|| Arc::new(MemoryEngine::new()) as Arc<dyn Engine>);
    EngineSelection::from_engine(engine)
}

static SELECTED: Lazy<EngineSelection> = Lazy::new(|| {
    let requested = std::env::var(ENGINE_ENV_VAR).ok();
    let selection = select_engine(requested.as_deref(), &[&MemoryProbe]);
    debug!(engine = selection.name, version = %selection.version, "selected engine");
    selection
});

/// Returns the process-wide engine selection, resolving it on first call.
pub fn default_engine() -> &'static EngineSelection {
    &SELECTED
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl EngineProbe for Unavailable {
        fn name(&self) -> &'static str {
            "native"
        }

        fn probe(&self) -> Option<Arc<dyn Engine>> {
            None
        }
    }

    #[test]
    fn requested_engine_is_used() {
        let selection = select_engine(Some("MEMORY"), &[&Unavailable, &MemoryProbe]);
        assert_eq!(selection.name, MemoryEngine::NAME);
    }

    #[test]
    fn unavailable_engine_falls_back() {
        let selection = select_engine(Some("native"), &[&Unavailable, &MemoryProbe]);
        assert_eq!(selection.name, MemoryEngine::NAME);
    }

    #[test]
    fn no_probe_succeeds() {
        let selection = select_engine(None, &[&Unavailable]);
        assert_eq!(selection.name, MemoryEngine::NAME);
    }

    #[test]
    fn default_is_stable() {
        let first = default_engine();
        let second = default_engine();
        assert!(Arc::ptr_eq(&first.engine, &second.engine));
    }
}
