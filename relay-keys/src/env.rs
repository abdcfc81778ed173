/// Process-environment seam used by resolution and the registry.
///
/// Lookups and `add_key` writes go through this trait so callers can run
/// against an in-memory environment instead of mutating the real one.
pub trait EnvAccess: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str);
}

/// The real process environment. Empty variables count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvAccess for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn set(&self, name: &str, value: &str) {
        // Callers serialize registry mutation (see the concurrency notes),
        // so the process-global write is not racing other threads.
        unsafe { std::env::set_var(name, value) };
    }
}

#[cfg(test)]
pub(crate) struct MapEnv(std::sync::Mutex<std::collections::HashMap<String, String>>);

#[cfg(test)]
impl MapEnv {
    pub(crate) fn new() -> Self {
        Self(std::sync::Mutex::new(std::collections::HashMap::new()))
    }
}

#[cfg(test)]
impl EnvAccess for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.0.lock().unwrap().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.0
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }
}
