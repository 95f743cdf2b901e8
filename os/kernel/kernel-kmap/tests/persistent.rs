mod common;

use common::{MockPlatform, TestPage, mapper};
use kernel_info::memory::{LAST_PKMAP, PAGE_OFFSET, PAGE_SIZE, PKMAP_BASE, pkmap_addr};
use kernel_kmap::{KmapPolicy, PersistentMap};
use kernel_memory_addresses::VirtualAddress;

fn in_pkmap_window(va: VirtualAddress) -> bool {
    (PKMAP_BASE..pkmap_addr(LAST_PKMAP)).contains(&va.as_u32())
}

#[test]
fn low_pages_bypass_the_pool() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::all());
    let va = m.map(TestPage::low(2));
    assert_eq!(va, VirtualAddress::new(PAGE_OFFSET + 2 * PAGE_SIZE));
    m.unmap(TestPage::low(2));
    assert_eq!(m.persistent().blocking_calls.get(), 0);
}

#[test]
fn high_pages_go_through_the_pool() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::all());
    let page = TestPage::high(1);

    let va = m.map(page);
    assert!(in_pkmap_window(va));
    assert_eq!(m.map(page), va);
    assert_eq!(m.persistent().refcount(page), 2);
    assert_eq!(m.persistent().blocking_calls.get(), 2);

    m.unmap(page);
    m.unmap(page);
    assert_eq!(m.persistent().refcount(page), 0);
    assert_eq!(m.persistent().page_at(va), None);
}

#[test]
#[should_panic(expected = "sleeping kmap called from atomic context")]
fn sleeping_map_inside_atomic_kmap_is_fatal() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::DEBUG_CHECKS);
    let _held = m.map_atomic(TestPage::high(1));
    let _ = m.map(TestPage::high(2));
}

#[test]
fn atomic_context_check_is_a_debug_check() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::empty());
    m.platform().atomic.set(true);
    let va = m.map(TestPage::high(2));
    assert!(in_pkmap_window(va));
}

#[test]
#[should_panic(expected = "kunmap called from interrupt context")]
fn unmap_from_interrupt_is_fatal_even_for_low_pages() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::empty());
    m.platform().interrupt.set(true);
    m.unmap(TestPage::low(1));
}

#[test]
fn atomic_map_reuses_persistent_mapping_on_vivt_cache() {
    let m = mapper::<4>(MockPlatform::vivt(), KmapPolicy::all());
    let page = TestPage::high(3);
    let pinned = m.map(page);

    let va = m.map_atomic(page);
    assert_eq!(va, pinned);
    assert_eq!(m.persistent().refcount(page), 2);
    assert!(!m.slots().contains(va));

    m.unmap_atomic(va + 0x40);
    assert_eq!(m.persistent().refcount(page), 1);
    assert_eq!(m.platform().pagefaults_disabled.get(), 0);
    assert!(m.platform().flushes().is_empty());

    m.unmap(page);
}

#[test]
fn reuse_applies_to_physically_tagged_cache_without_debug_checks() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::REUSE_PERSISTENT);
    let page = TestPage::high(3);
    let pinned = m.map(page);
    let va = m.map_atomic(page);
    assert_eq!(va, pinned);
    m.unmap_atomic(va);
    m.unmap(page);
}

#[test]
fn debug_checks_force_a_slot_on_physically_tagged_cache() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::all());
    let page = TestPage::high(3);
    let pinned = m.map(page);

    let va = m.map_atomic(page);
    assert_ne!(va, pinned);
    assert!(m.slots().contains(va));
    assert_eq!(m.persistent().refcount(page), 1);

    m.unmap_atomic(va);
    m.unmap(page);
}

#[test]
fn reuse_can_be_turned_off() {
    let m = mapper::<4>(MockPlatform::vivt(), KmapPolicy::DEBUG_CHECKS);
    let page = TestPage::high(3);
    let pinned = m.map(page);

    let va = m.map_atomic(page);
    assert!(m.slots().contains(va));
    assert_ne!(va, pinned);
    m.unmap_atomic(va);
    m.unmap(page);
}

#[test]
fn unmapped_high_page_gets_a_slot_even_with_reuse() {
    let m = mapper::<4>(MockPlatform::vivt(), KmapPolicy::all());
    let va = m.map_atomic(TestPage::high(4));
    assert!(m.slots().contains(va));
    m.unmap_atomic(va);
}

#[test]
#[should_panic(expected = "persistent kmap address 0xBFE03000 has no page")]
fn unmapping_an_unused_persistent_address_is_fatal() {
    let m = mapper::<4>(MockPlatform::default(), KmapPolicy::all());
    m.unmap_atomic(VirtualAddress::new(pkmap_addr(3)));
}
