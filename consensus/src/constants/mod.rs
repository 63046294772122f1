pub mod perf {
    //! Performance-tuning constants (cache sizes etc.) which do not affect
    //! consensus rules

    /// The default cache size for most block-keyed stores
    pub const DEFAULT_CACHE_SIZE: u64 = 100_000;

    /// The default cache size for stores holding large per-block payloads
    /// (bodies, UTXO diffs, acceptance data)
    pub const LARGE_DATA_CACHE_SIZE: u64 = 2_000;

    /// The default cache size for the virtual UTXO set
    pub const UTXO_CACHE_SIZE: u64 = 10_000;

    pub const DEFAULT_REINDEX_DEPTH: u64 = 100;
    pub const DEFAULT_REINDEX_SLACK: u64 = 1 << 12;
}
