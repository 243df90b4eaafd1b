//! SysV shared-memory page pool.
//!
//! One contiguous segment divided into equal pages. The segment id is
//! handed to the X server so `GetImage` replies land directly in our pages;
//! the producer fills whichever pages are free and forwards them to the
//! timing loop by reference, reclaiming each page when its frame is
//! dropped.

use std::io;
use std::ptr;
use std::slice;

pub struct PagePool {
    id: i32,
    base: *mut u8,
    page_size: usize,
    page_count: usize,
}

/// Actual size of a segment as reported by the kernel; may exceed the
/// requested size due to page rounding.
fn segment_size(id: i32) -> io::Result<usize> {
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    if unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ds.shm_segsz)
}

// SAFETY: the pool moves between threads as a whole; page access goes
// through &self/&mut self or through PageRef hand-off below.
unsafe impl Send for PagePool {}

impl PagePool {
    /// Allocate and attach a fresh private segment of
    /// `page_size * page_count` bytes.
    pub fn new(page_size: usize, page_count: usize) -> io::Result<Self> {
        let total = page_size * page_count;
        let id = unsafe {
            libc::shmget(libc::IPC_PRIVATE, total, libc::IPC_CREAT | libc::IPC_EXCL | 0o600)
        };
        if id < 0 {
            return Err(io::Error::last_os_error());
        }

        let real = match segment_size(id) {
            Ok(real) => real,
            Err(e) => {
                unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
                return Err(e);
            }
        };
        if real < total {
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
            return Err(io::Error::other(format!(
                "shm segment truncated: got {real} bytes, need {total}"
            )));
        }

        let base = unsafe { libc::shmat(id, ptr::null(), 0) };
        if base == usize::MAX as *mut libc::c_void {
            let err = io::Error::last_os_error();
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
            return Err(err);
        }

        // Mark for removal now; the kernel destroys the segment once the
        // last attachment (ours or the X server's) goes away.
        unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };

        log::debug!("shm segment {id} attached, {page_count} pages of {page_size} bytes");
        Ok(PagePool { id, base: base as *mut u8, page_size, page_count })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Byte offset of page `index` within the segment.
    pub fn offset(&self, index: usize) -> usize {
        assert!(index < self.page_count);
        index * self.page_size
    }

    pub fn page(&self, index: usize) -> &[u8] {
        let offset = self.offset(index);
        unsafe { slice::from_raw_parts(self.base.add(offset), self.page_size) }
    }

    pub fn page_mut(&mut self, index: usize) -> &mut [u8] {
        let offset = self.offset(index);
        unsafe { slice::from_raw_parts_mut(self.base.add(offset), self.page_size) }
    }

    /// Two distinct pages at once, the second mutably. Pages never overlap.
    pub fn page_pair(&mut self, src: usize, dst: usize) -> (&[u8], &mut [u8]) {
        assert_ne!(src, dst);
        let src_offset = self.offset(src);
        let dst_offset = self.offset(dst);
        unsafe {
            (
                slice::from_raw_parts(self.base.add(src_offset), self.page_size),
                slice::from_raw_parts_mut(self.base.add(dst_offset), self.page_size),
            )
        }
    }

    pub fn page_ref(&self, index: usize) -> PageRef {
        let offset = self.offset(index);
        PageRef { ptr: unsafe { self.base.add(offset) }, len: self.page_size }
    }
}

impl Drop for PagePool {
    fn drop(&mut self) {
        unsafe { libc::shmdt(self.base as *const libc::c_void) };
    }
}

/// A page sent downstream by reference instead of copy.
pub struct PageRef {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the raw pointer aliases pool memory; the producer reserves a
// page for the lifetime of the frame carrying it and only reselects it
// once the frame's drop has returned it to the free list.
unsafe impl Send for PageRef {}

impl PageRef {
    /// # Safety
    ///
    /// The pool must still be attached and the page must still be reserved
    /// to the caller, i.e. not yet returned to the producer's free list.
    pub unsafe fn as_slice(&self) -> &[u8] {
        slice::from_raw_parts(self.ptr, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_disjoint_and_sized() {
        let mut pool = PagePool::new(64, 3).unwrap();

        assert_eq!(pool.offset(0), 0);
        assert_eq!(pool.offset(1), 64);
        assert_eq!(pool.offset(2), 128);

        for i in 0..3 {
            assert_eq!(pool.page(i).len(), 64);
        }

        pool.page_mut(0).fill(0xAA);
        pool.page_mut(1).fill(0xBB);
        pool.page_mut(2).fill(0xCC);
        assert!(pool.page(0).iter().all(|&b| b == 0xAA));
        assert!(pool.page(1).iter().all(|&b| b == 0xBB));
        assert!(pool.page(2).iter().all(|&b| b == 0xCC));

        let (src, dst) = pool.page_pair(1, 2);
        assert!(src.iter().all(|&b| b == 0xBB));
        dst.fill(0x11);
        assert!(pool.page(1).iter().all(|&b| b == 0xBB));
        assert!(pool.page(2).iter().all(|&b| b == 0x11));
    }

    #[test]
    fn page_ref_reads_live_contents() {
        let mut pool = PagePool::new(16, 3).unwrap();
        pool.page_mut(2).fill(0x5A);
        let page = pool.page_ref(2);
        assert_eq!(unsafe { page.as_slice() }, &[0x5A; 16][..]);
    }

    #[test]
    #[should_panic]
    fn out_of_range_page_panics() {
        let pool = PagePool::new(16, 3).unwrap();
        pool.offset(3);
    }
}
