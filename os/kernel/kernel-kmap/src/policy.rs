//! # Mapper capability flags

bitflags::bitflags! {
    /// Build- or boot-time choices that change how the atomic mapper behaves.
    ///
    /// The preemption model is not a flag: it is picked by the nesting scope
    /// type the mapper is built with (see [`crate::nesting`] and
    /// [`crate::preempt`]).
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct KmapPolicy: u8 {
        /// Verify slot exclusivity and LIFO order, and forbid sleeping kmaps
        /// from atomic context.
        ///
        /// Also forces dedicated slots on caches without virtual aliasing so
        /// lost unmaps are caught where the slot is reused.
        const DEBUG_CHECKS = 1 << 0;

        /// Hand out a page's existing persistent mapping instead of a slot
        /// when there is one.
        ///
        /// Saves a slot and, on virtually tagged caches, keeps a single
        /// virtual alias of the page. Costs a lookup in the persistent pool
        /// on every high-page `map_atomic`.
        const REUSE_PERSISTENT = 1 << 1;
    }
}

impl Default for KmapPolicy {
    /// Persistent reuse on; debug checks on in debug builds or with the
    /// `debug-highmem` feature.
    fn default() -> Self {
        if cfg!(any(debug_assertions, feature = "debug-highmem")) {
            Self::REUSE_PERSISTENT | Self::DEBUG_CHECKS
        } else {
            Self::REUSE_PERSISTENT
        }
    }
}

impl KmapPolicy {
    #[inline]
    #[must_use]
    pub const fn debug_checks(self) -> bool {
        self.contains(Self::DEBUG_CHECKS)
    }

    /// Whether `map_atomic` should look for a persistent mapping first.
    #[inline]
    #[must_use]
    pub const fn reuses_persistent(self, cache_aliases: bool) -> bool {
        if !self.contains(Self::REUSE_PERSISTENT) {
            return false;
        }
        cache_aliases || !self.debug_checks()
    }
}
