//! Owned unmanaged buffers handed to native calls
//!
//! Every buffered native call owns exactly one unmanaged memory block for
//! its duration. The block is acquired immediately before the call, may be
//! reallocated by the negotiation loop, and is released exactly once on
//! every exit path. Acquisitions and releases are counted globally so tests
//! can verify the balance after any sequence of calls.

use crate::error::{RasError, Result};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Alignment of every unmanaged block. Native record layouts require at
/// most 8-byte alignment.
const BUFFER_ALIGN: usize = 8;

static ACQUIRED: AtomicU64 = AtomicU64::new(0);
static RELEASED: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the process-wide buffer accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationCounters {
    pub acquired: u64,
    pub released: u64,
}

impl AllocationCounters {
    /// Number of buffers currently live
    pub fn outstanding(&self) -> u64 {
        self.acquired - self.released
    }
}

/// Current acquisition/release counters
pub fn allocation_counters() -> AllocationCounters {
    AllocationCounters {
        acquired: ACQUIRED.load(Ordering::SeqCst),
        released: RELEASED.load(Ordering::SeqCst),
    }
}

/// Serializes tests that assert on the global counters.
#[cfg(test)]
pub(crate) fn counter_test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// An exclusively-owned unmanaged memory block
///
/// The pointer is non-null iff the length is nonzero; the block never
/// aliases memory it does not own, and release is idempotent. Dropping the
/// buffer releases it, so no exit path can leak.
#[derive(Debug)]
pub struct NativeBuffer {
    ptr: *mut u8,
    len: usize,
}

impl NativeBuffer {
    /// Create an empty, unallocated buffer
    pub const fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    /// Release any current block and acquire a fresh zero-initialized one
    /// of `size` bytes. `size == 0` leaves the buffer in the empty state.
    pub fn acquire(&mut self, size: usize) -> Result<()> {
        self.release();

        if size == 0 {
            return Ok(());
        }

        let layout = Layout::from_size_align(size, BUFFER_ALIGN)
            .map_err(|e| RasError::Allocation(format!("Invalid buffer layout: {e}")))?;

        // Zeroed so stale process memory never reaches a decoder.
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(RasError::Allocation(format!(
                "Failed to allocate {size} byte buffer"
            )));
        }

        ACQUIRED.fetch_add(1, Ordering::SeqCst);
        self.ptr = ptr;
        self.len = size;
        Ok(())
    }

    /// Ensure the buffer holds at least `size` bytes.
    ///
    /// Contents are not preserved: the native retry repopulates the whole
    /// buffer on the next call.
    pub fn grow(&mut self, size: usize) -> Result<()> {
        if size <= self.len {
            return Ok(());
        }
        self.acquire(size)
    }

    /// Free the owned block and return to the empty state. Idempotent.
    pub fn release(&mut self) {
        if self.ptr.is_null() {
            return;
        }

        // acquire() succeeded with this exact layout.
        let layout = Layout::from_size_align(self.len, BUFFER_ALIGN)
            .expect("layout was valid at acquisition");
        unsafe { dealloc(self.ptr, layout) };
        RELEASED.fetch_add(1, Ordering::SeqCst);

        self.ptr = ptr::null_mut();
        self.len = 0;
    }

    /// Raw address of the block, null when unallocated
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Allocated length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View of the whole allocated block
    pub fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// Mutable view of the whole allocated block
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.ptr.is_null() {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }
}

impl Default for NativeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Parameter record for one buffered native call
///
/// Pairs the owned buffer with the in/out byte count the native operation
/// reads, and overwrites with the required size when it reports the buffer
/// as too small.
#[derive(Debug, Default)]
pub struct CallParams {
    buf: NativeBuffer,
    size: usize,
}

impl CallParams {
    pub fn new() -> Self {
        Self {
            buf: NativeBuffer::new(),
            size: 0,
        }
    }

    /// Release any current buffer and allocate a fresh zeroed block,
    /// resetting the in/out count to match
    pub fn reset(&mut self, size: usize) -> Result<()> {
        self.buf.acquire(size)?;
        self.size = size;
        Ok(())
    }

    /// Free the buffer and clear to the empty state. Idempotent.
    pub fn release(&mut self) {
        self.buf.release();
        self.size = 0;
    }

    /// Address of the owned block, null when unallocated
    pub fn address(&self) -> *mut u8 {
        self.buf.as_ptr()
    }

    /// Bytes currently allocated at the address
    pub fn allocated_len(&self) -> usize {
        self.buf.len()
    }

    /// The in/out byte count as last seen or written by the native side
    pub fn size(&self) -> usize {
        self.size
    }

    /// Record the byte count reported by the native side
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_mut_slice()
    }
}

/// Parameter record for native calls that return an array of fixed-size
/// records alongside an element count
#[derive(Debug, Default)]
pub struct CountedCallParams {
    params: CallParams,
    count: u32,
}

impl CountedCallParams {
    pub fn new() -> Self {
        Self {
            params: CallParams::new(),
            count: 0,
        }
    }

    pub fn reset(&mut self, size: usize) -> Result<()> {
        self.count = 0;
        self.params.reset(size)
    }

    pub fn release(&mut self) {
        self.count = 0;
        self.params.release();
    }

    /// Element count reported by the last successful call
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Record the element count reported by the native side
    pub fn set_count(&mut self, count: u32) {
        self.count = count;
    }

    pub fn address(&self) -> *mut u8 {
        self.params.address()
    }

    pub fn allocated_len(&self) -> usize {
        self.params.allocated_len()
    }

    pub fn size(&self) -> usize {
        self.params.size()
    }

    pub fn set_size(&mut self, size: usize) {
        self.params.set_size(size);
    }

    pub fn as_slice(&self) -> &[u8] {
        self.params.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.params.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_balance() {
        let _guard = counter_test_guard();
        let before = allocation_counters();

        let mut buf = NativeBuffer::new();
        buf.acquire(128).expect("acquire");
        assert_eq!(buf.len(), 128);
        assert!(!buf.as_ptr().is_null());
        buf.release();
        assert!(buf.as_ptr().is_null());
        assert_eq!(buf.len(), 0);

        let after = allocation_counters();
        assert_eq!(after.acquired - before.acquired, 1);
        assert_eq!(after.released - before.released, 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let _guard = counter_test_guard();
        let before = allocation_counters();

        let mut buf = NativeBuffer::new();
        buf.acquire(32).expect("acquire");
        buf.release();
        buf.release();
        buf.release();

        let after = allocation_counters();
        assert_eq!(after.released - before.released, 1);
    }

    #[test]
    fn test_drop_releases() {
        let _guard = counter_test_guard();
        let before = allocation_counters();

        {
            let mut buf = NativeBuffer::new();
            buf.acquire(64).expect("acquire");
        }

        let after = allocation_counters();
        assert_eq!(after.acquired - before.acquired, 1);
        assert_eq!(after.released - before.released, 1);
    }

    #[test]
    fn test_acquire_zeroes_memory() {
        let mut buf = NativeBuffer::new();
        buf.acquire(256).expect("acquire");
        assert!(buf.as_slice().iter().all(|&b| b == 0));

        buf.as_mut_slice()[0] = 0xAB;
        buf.acquire(256).expect("reacquire");
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size_acquire_is_empty() {
        let mut buf = NativeBuffer::new();
        buf.acquire(0).expect("acquire");
        assert!(buf.as_ptr().is_null());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_grow_keeps_larger_buffer() {
        let mut buf = NativeBuffer::new();
        buf.acquire(100).expect("acquire");
        buf.grow(50).expect("grow smaller is a no-op");
        assert_eq!(buf.len(), 100);
        buf.grow(200).expect("grow");
        assert_eq!(buf.len(), 200);
    }

    #[test]
    fn test_call_params_reset_updates_size() {
        let mut params = CallParams::new();
        params.reset(40).expect("reset");
        assert_eq!(params.size(), 40);
        assert_eq!(params.allocated_len(), 40);

        params.set_size(120);
        assert_eq!(params.size(), 120);
        assert_eq!(params.allocated_len(), 40);

        params.release();
        assert_eq!(params.size(), 0);
        assert!(params.address().is_null());
    }

    #[test]
    fn test_counted_params_reset_clears_count() {
        let mut params = CountedCallParams::new();
        params.reset(80).expect("reset");
        params.set_count(2);
        assert_eq!(params.count(), 2);

        params.reset(160).expect("reset");
        assert_eq!(params.count(), 0);
    }
}
