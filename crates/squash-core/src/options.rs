use std::any::Any;

/// Opaque, per-codec configuration bundle.
///
/// The dispatcher treats this as opaque and only ever passes `&dyn CodecOptions`
/// through to the owning codec, which downcasts it back to its own concrete
/// type via [`CodecOptions::as_any`]. This is the Rust-native stand-in for the
/// options-parsing subsystem described in the specification: callers build a
/// concrete options struct (see [`CompressionLevel`]) instead of passing a
/// NULL-terminated varargs list.
pub trait CodecOptions: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Compression level shared by most codecs in this workspace (0 = store,
/// 9 = best). Codecs that need more than a single knob (window size, thread
/// count, dictionary, ...) define their own options struct instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const FASTEST: Self = Self(1);
    pub const DEFAULT: Self = Self(6);
    pub const BEST: Self = Self(9);

    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CodecOptions for CompressionLevel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcasts an options bundle to the concrete type a codec expects,
/// falling back to `default` when the caller passed `None` or the wrong type.
pub fn downcast_or_default<T: CodecOptions + Default + Clone>(
    options: Option<&dyn CodecOptions>,
    default: &T,
) -> T {
    options
        .and_then(|o| o.as_any().downcast_ref::<T>())
        .cloned()
        .unwrap_or_else(|| default.clone())
}
