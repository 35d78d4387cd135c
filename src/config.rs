//! Options controlling how documents are opened and saved.

use std::time::Duration;

/// Default limit on the size of a byte source (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 0x4000_0000;

/// Options for opening a document.
///
/// # Example
///
/// ```
/// use pdf_engine::config::OpenOptions;
/// use std::time::Duration;
///
/// let strict = OpenOptions::strict();
/// assert!(!strict.allow_malformed_streams);
///
/// let tuned = OpenOptions::default()
///     .with_object_cache_ttl(Duration::from_secs(5))
///     .with_max_file_size(64 * 1024 * 1024);
/// assert_eq!(tuned.max_file_size, 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Fail on the first structural problem instead of attempting recovery
    ///
    /// When false, a broken `startxref` chain falls back to scanning the file
    /// for object headers.
    pub strict: bool,

    /// Maximum array/dictionary nesting depth
    pub max_nesting: usize,

    /// Maximum depth for reference chains, object-stream `Extends` chains and
    /// nested form XObjects
    pub max_recursion_depth: u32,

    /// Largest byte source accepted by `open`
    pub max_file_size: u64,

    /// Maximum decompressed stream size in bytes (0 = unlimited)
    pub max_decompressed_size: usize,

    /// Maximum decompressed:compressed ratio (0 = unlimited)
    pub max_decompression_ratio: u32,

    /// Age after which cached objects are evicted
    pub object_cache_ttl: Duration,

    /// Age after which decoded object streams are evicted
    pub object_stream_cache_ttl: Duration,

    /// Bytes read first when parsing an indirect object; doubled until the
    /// object fits
    pub read_window: usize,

    /// Scan forward for `endstream` when the declared `Length` does not land on it
    pub allow_malformed_streams: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl OpenOptions {
    /// Strict options: no recovery paths.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_malformed_streams: false,
            ..Self::lenient()
        }
    }

    /// Lenient options: repair what can be repaired.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 100,
            max_recursion_depth: 64,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_decompressed_size: 256 * 1024 * 1024,
            max_decompression_ratio: 0,
            object_cache_ttl: Duration::from_secs(60),
            object_stream_cache_ttl: Duration::from_secs(60),
            read_window: 4096,
            allow_malformed_streams: true,
        }
    }

    /// Set the object cache expiry.
    pub fn with_object_cache_ttl(mut self, ttl: Duration) -> Self {
        self.object_cache_ttl = ttl;
        self
    }

    /// Set the object-stream cache expiry.
    pub fn with_object_stream_cache_ttl(mut self, ttl: Duration) -> Self {
        self.object_stream_cache_ttl = ttl;
        self
    }

    /// Set the largest accepted byte source.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set the decompressed size limit.
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Set the initial read window for indirect objects.
    pub fn with_read_window(mut self, window: usize) -> Self {
        self.read_window = window;
        self
    }
}

/// Options for saving a document.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Flate-encode streams that carry no `Filter`
    pub compress_streams: bool,
}

impl SaveOptions {
    /// Enable or disable stream compression.
    pub fn with_compression(mut self, enable: bool) -> Self {
        self.compress_streams = enable;
        self
    }
}
