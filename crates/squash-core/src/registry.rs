use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::codec::CodecDescriptor;
use crate::error::{Result, SquashError};

/// Process-wide table mapping codec name to descriptor.
///
/// This crate does not load codecs dynamically (there is no plugin loader
/// here, unlike the C library this specification is modeled on): the five
/// codec crates in this workspace each call [`register`] once, from their own
/// `register()` function, and `squash-cli`/the test suite call those
/// functions during start-up. [`lookup`] is otherwise a plain, thread-safe
/// read.
static REGISTRY: OnceLock<RwLock<HashMap<&'static str, CodecDescriptor>>> = OnceLock::new();

fn table() -> &'static RwLock<HashMap<&'static str, CodecDescriptor>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a codec descriptor under its name, overwriting any previous
/// registration with the same name.
pub fn register(descriptor: CodecDescriptor) {
    let name = descriptor.name();
    table()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(name, descriptor);
}

/// Looks up a previously registered codec by name.
pub fn lookup(name: &str) -> Result<CodecDescriptor> {
    table()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(name)
        .cloned()
        .ok_or_else(|| SquashError::BadParam(name.to_string()))
}

/// Names of every codec currently registered, for diagnostics and `squash-cli --list`.
pub fn registered_names() -> Vec<&'static str> {
    let mut names: Vec<_> = table()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .keys()
        .copied()
        .collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Capabilities, Codec};
    use std::sync::Arc;

    struct Dummy;
    impl Codec for Dummy {
        fn name(&self) -> &'static str {
            "dummy-for-registry-test"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::BUFFER
        }
    }

    #[test]
    fn register_then_lookup() {
        register(Arc::new(Dummy));
        let found = lookup("dummy-for-registry-test").unwrap();
        assert_eq!(found.name(), "dummy-for-registry-test");
        assert!(lookup("does-not-exist").is_err());
    }
}
