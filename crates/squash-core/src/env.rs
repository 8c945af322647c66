use std::sync::OnceLock;

/// Resolved `SQUASH_MAP_SPLICE` setting, read once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapPreference {
    /// Never use mmap.
    Never,
    /// Use mmap only when the codec has no incremental stream tier.
    WhenNoStream,
    /// Prefer mmap whenever the codec has no native splice.
    Always,
}

static MMAP_PREFERENCE: OnceLock<MmapPreference> = OnceLock::new();
static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Returns the process-wide mmap preference, resolving `SQUASH_MAP_SPLICE`
/// from the environment on first call. Every subsequent call, from any
/// thread, observes the same fully-initialized value — the `OnceLock` gives
/// the same publication guarantee as a C `once_flag` guard.
pub fn mmap_preference() -> MmapPreference {
    *MMAP_PREFERENCE.get_or_init(|| match std::env::var("SQUASH_MAP_SPLICE") {
        Ok(v) if v.eq_ignore_ascii_case("no") => MmapPreference::Never,
        Ok(v) if v.eq_ignore_ascii_case("always") => MmapPreference::Always,
        // Unset, unknown, or explicitly "yes" all mean the same default.
        _ => MmapPreference::WhenNoStream,
    })
}

/// Lazily queries and caches the OS page size.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        #[cfg(unix)]
        {
            // SAFETY: sysconf(_SC_PAGESIZE) has no preconditions.
            let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if n > 0 {
                return n as usize;
            }
        }
        4096
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_reasonable() {
        let n = page_size();
        assert!(n >= 512 && n.is_power_of_two());
    }
}
