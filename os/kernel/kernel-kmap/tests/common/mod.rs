#![allow(dead_code)]

use kernel_info::memory::{
    FIXADDR_START, LOWMEM_SIZE, PAGE_OFFSET, PAGE_SHIFT, PHYS_OFFSET, pkmap_addr, pkmap_nr,
};
use kernel_kmap::{
    AtomicMapper, CpuId, CurrentTask, DataCache, ExecutionContext, KmapPolicy, KmapPte,
    PageDirectory, PageTable, PerCpuNesting, PerTaskNesting, PersistentMap, SlotTable, TaskKmaps,
};
use kernel_memory_addresses::{PageFrameNumber, VirtualAddress};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// First frame outside the linear map.
pub const HIGHMEM_PFN: u32 = ((PHYS_OFFSET + LOWMEM_SIZE as u64) >> PAGE_SHIFT) as u32;

pub const CPUS: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestPage(pub u32);

impl TestPage {
    pub const fn high(n: u32) -> Self {
        Self(HIGHMEM_PFN + n)
    }

    pub const fn low(n: u32) -> Self {
        Self((PHYS_OFFSET >> PAGE_SHIFT) as u32 + n)
    }

    pub const fn pfn(self) -> PageFrameNumber {
        PageFrameNumber::new(self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Flush(VirtualAddress, u32),
    Write(VirtualAddress, KmapPte),
}

/// Single-threaded stand-in for the architecture.
#[derive(Default)]
pub struct MockPlatform {
    pub cpu: Cell<u32>,
    pub interrupt: Cell<bool>,
    pub atomic: Cell<bool>,
    pub vivt: bool,
    pub pagefaults_disabled: Cell<i32>,
    pub ptes: RefCell<BTreeMap<VirtualAddress, KmapPte>>,
    pub events: RefCell<Vec<Event>>,
}

impl MockPlatform {
    pub fn vivt() -> Self {
        Self {
            vivt: true,
            ..Self::default()
        }
    }

    pub fn flushes(&self) -> Vec<(VirtualAddress, u32)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match *e {
                Event::Flush(va, len) => Some((va, len)),
                Event::Write(..) => None,
            })
            .collect()
    }
}

impl ExecutionContext for MockPlatform {
    fn current_cpu(&self) -> CpuId {
        CpuId::new(self.cpu.get())
    }

    fn in_interrupt(&self) -> bool {
        self.interrupt.get()
    }

    fn in_atomic(&self) -> bool {
        self.atomic.get() || self.interrupt.get() || self.pagefaults_disabled.get() > 0
    }

    fn pagefault_disable(&self) {
        self.pagefaults_disabled.set(self.pagefaults_disabled.get() + 1);
    }

    fn pagefault_enable(&self) {
        let depth = self.pagefaults_disabled.get();
        assert!(depth > 0, "pagefault_enable without pagefault_disable");
        self.pagefaults_disabled.set(depth - 1);
    }
}

impl PageTable for MockPlatform {
    fn read_pte(&self, va: VirtualAddress) -> KmapPte {
        self.ptes.borrow().get(&va).copied().unwrap_or(KmapPte::NONE)
    }

    fn write_pte(&self, va: VirtualAddress, pte: KmapPte) {
        assert!(va.is_page_aligned());
        self.ptes.borrow_mut().insert(va, pte);
        self.events.borrow_mut().push(Event::Write(va, pte));
    }
}

impl DataCache for MockPlatform {
    fn requires_flush_on_unmap(&self) -> bool {
        self.vivt
    }

    fn flush_range(&self, start: VirtualAddress, len: u32) {
        self.events.borrow_mut().push(Event::Flush(start, len));
    }
}

impl PageDirectory for MockPlatform {
    type Page = TestPage;

    fn is_high(&self, page: TestPage) -> bool {
        page.0 >= HIGHMEM_PFN
    }

    fn frame_of(&self, page: TestPage) -> PageFrameNumber {
        page.pfn()
    }

    fn lowmem_address(&self, page: TestPage) -> VirtualAddress {
        let offset = (u64::from(page.0) << PAGE_SHIFT) - PHYS_OFFSET;
        VirtualAddress::new(PAGE_OFFSET + offset as u32)
    }

    fn page_of_frame(&self, pfn: PageFrameNumber) -> TestPage {
        TestPage(pfn.as_u32())
    }

    fn lowmem_page(&self, va: VirtualAddress) -> TestPage {
        let pa = u64::from(va.as_u32() - PAGE_OFFSET) + PHYS_OFFSET;
        TestPage((pa >> PAGE_SHIFT) as u32)
    }
}

/// Persistent kmap pool with reference counts and a sleep detector.
#[derive(Default)]
pub struct MockPkmap {
    /// page -> (entry, refcount)
    pub entries: RefCell<BTreeMap<TestPage, (usize, usize)>>,
    pub next: Cell<usize>,
    pub blocking_calls: Cell<usize>,
    pub forbid_sleep: Cell<bool>,
}

impl MockPkmap {
    pub fn refcount(&self, page: TestPage) -> usize {
        self.entries.borrow().get(&page).map_or(0, |&(_, count)| count)
    }
}

impl PersistentMap for MockPkmap {
    type Page = TestPage;

    fn map(&self, page: TestPage) -> VirtualAddress {
        assert!(!self.forbid_sleep.get(), "persistent map slept");
        self.blocking_calls.set(self.blocking_calls.get() + 1);
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(page).or_insert_with(|| {
            let nr = self.next.get();
            self.next.set(nr + 1);
            (nr, 0)
        });
        entry.1 += 1;
        VirtualAddress::new(pkmap_addr(entry.0))
    }

    fn unmap(&self, page: TestPage) {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(&page).expect("unmap of an unmapped page");
        entry.1 -= 1;
        if entry.1 == 0 {
            entries.remove(&page);
        }
    }

    fn get(&self, page: TestPage) -> Option<VirtualAddress> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(&page)?;
        entry.1 += 1;
        Some(VirtualAddress::new(pkmap_addr(entry.0)))
    }

    fn page_at(&self, va: VirtualAddress) -> Option<TestPage> {
        let nr = pkmap_nr(va.as_u32());
        self.entries
            .borrow()
            .iter()
            .find(|(_, (entry, _))| *entry == nr)
            .map(|(page, _)| *page)
    }
}

pub type Mapper<const N: usize> = AtomicMapper<MockPlatform, MockPkmap, PerCpuNesting<N, CPUS>, N>;

pub fn slots<const N: usize>() -> SlotTable<N> {
    SlotTable::new(VirtualAddress::new(FIXADDR_START), CPUS).unwrap()
}

pub fn mapper<const N: usize>(platform: MockPlatform, policy: KmapPolicy) -> Mapper<N> {
    AtomicMapper::new(platform, MockPkmap::default(), PerCpuNesting::new(), slots(), policy)
}

/// Single-CPU scheduler: a fixed set of tasks, one of them running.
pub struct MockScheduler<const N: usize> {
    pub tasks: Vec<TaskKmaps<N>>,
    pub running: Cell<usize>,
}

impl<const N: usize> MockScheduler<N> {
    pub fn new(tasks: usize) -> Self {
        Self {
            tasks: (0..tasks).map(|_| TaskKmaps::new()).collect(),
            running: Cell::new(0),
        }
    }
}

impl<const N: usize> CurrentTask<N> for MockScheduler<N> {
    fn current_kmaps(&self, _cpu: CpuId) -> &TaskKmaps<N> {
        &self.tasks[self.running.get()]
    }
}

pub type RtMapper<const N: usize> =
    AtomicMapper<MockPlatform, MockPkmap, PerTaskNesting<MockScheduler<N>>, N>;

pub fn rt_mapper<const N: usize>(tasks: usize, policy: KmapPolicy) -> RtMapper<N> {
    AtomicMapper::new(
        MockPlatform::default(),
        MockPkmap::default(),
        PerTaskNesting::new(MockScheduler::new(tasks)),
        slots(),
        policy,
    )
}
