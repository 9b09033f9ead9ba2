//! Global allocator for the frame buffers. The M0+ has no compare-and-swap, so the heap is
//! guarded by a critical section instead of a spinlock.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::RefCell;
use core::ptr::{self, NonNull};
use critical_section::Mutex;
use linked_list_allocator::Heap;

pub struct CameraHeap {
    heap: Mutex<RefCell<Heap>>,
}

impl CameraHeap {
    /// An empty heap. `init` must be called before the first allocation.
    pub const fn empty() -> Self {
        CameraHeap {
            heap: Mutex::new(RefCell::new(Heap::empty())),
        }
    }

    /// Hand `size` bytes starting at `start` to the heap.
    ///
    /// # Safety
    ///
    /// Call once. The region must be unused by anything else for the life of the program.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        critical_section::with(|cs| self.heap.borrow_ref_mut(cs).init(start, size));
    }

    /// Bytes currently free.
    pub fn free(&self) -> usize {
        critical_section::with(|cs| self.heap.borrow_ref_mut(cs).free())
    }
}

unsafe impl GlobalAlloc for CameraHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        critical_section::with(|cs| {
            self.heap
                .borrow_ref_mut(cs)
                .allocate_first_fit(layout)
                .map_or(ptr::null_mut(), |p| p.as_ptr())
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        critical_section::with(|cs| {
            self.heap
                .borrow_ref_mut(cs)
                .deallocate(NonNull::new_unchecked(ptr), layout)
        });
    }
}
