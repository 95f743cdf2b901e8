use crate::mapper::AtomicMapper;
use crate::nesting::NestingScope;
use crate::platform::{PersistentMap, Platform};
use core::marker::PhantomData;
use core::ops::Deref;
use kernel_memory_addresses::VirtualAddress;

/// An atomic kmap that is released when dropped.
///
/// Created by [`AtomicMapper::kmap_atomic`]. The guard stands for the slot it
/// claimed: dropping it pops exactly that slot. Guards declared in one scope
/// drop in reverse order, which is the order the slot stack requires.
///
/// The guard is neither `Send` nor `Sync`: a slot belongs to the CPU (or
/// task) that claimed it.
///
/// # Example
/// ```ignore
/// let src = mapper.kmap_atomic(src_page);
/// let dst = mapper.kmap_atomic(dst_page);
/// copy_page(*dst, *src);
/// // `dst` is unmapped first, then `src`.
/// ```
pub struct AtomicKmap<'m, P, K, S, const N: usize>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    S: NestingScope<N>,
{
    mapper: &'m AtomicMapper<P, K, S, N>,
    address: VirtualAddress,
    _not_send: PhantomData<*const ()>,
}

impl<'m, P, K, S, const N: usize> AtomicKmap<'m, P, K, S, N>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    S: NestingScope<N>,
{
    pub(crate) const fn new(mapper: &'m AtomicMapper<P, K, S, N>, address: VirtualAddress) -> Self {
        Self {
            mapper,
            address,
            _not_send: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn address(&self) -> VirtualAddress {
        self.address
    }
}

impl<P, K, S, const N: usize> Deref for AtomicKmap<'_, P, K, S, N>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    S: NestingScope<N>,
{
    type Target = VirtualAddress;

    fn deref(&self) -> &Self::Target {
        &self.address
    }
}

impl<P, K, S, const N: usize> Drop for AtomicKmap<'_, P, K, S, N>
where
    P: Platform,
    K: PersistentMap<Page = P::Page>,
    S: NestingScope<N>,
{
    fn drop(&mut self) {
        self.mapper.unmap_atomic(self.address);
    }
}
