//! Frame producer: on each capture signal, pulls window pixels into a free
//! pool page, composites onto the canvas, and hands the page to the timing
//! loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use ringbuf::traits::Producer as _;
use ringbuf::HeapProd;
use x11rb::protocol::shm;

use super::display::{CursorImage, Display, DisplayError, Geometry};
use super::events::CaptureEvent;
use crate::shm::{PagePool, PageRef};
use crate::video::{Canvas, BYTES_PER_PIXEL};

/// One captured canvas riding on a reserved pool page. Dropping the frame
/// (after presentation, or when the channel is full) returns the page to
/// the producer's free list.
pub struct Frame {
    page: PageRef,
    index: usize,
    return_tx: Sender<usize>,
    pub time: Instant,
}

impl Frame {
    /// # Safety
    ///
    /// The pool must still be attached. The page is reserved to this frame
    /// until drop, so the producer will not rewrite it underneath.
    pub unsafe fn pixels(&self) -> &[u8] {
        self.page.as_slice()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // hand the page back; if the producer is gone the pool goes with it
        let _ = self.return_tx.send(self.index);
    }
}

/// Tracks which pool pages are free versus riding in a frame. Pages come
/// back through a return channel fed by [`Frame::drop`], so a page is never
/// reselected while the timing loop can still read it.
struct PageLedger {
    free: VecDeque<usize>,
    return_tx: Sender<usize>,
    returns: Receiver<usize>,
}

impl PageLedger {
    fn new(page_count: usize) -> Self {
        let (return_tx, returns) = mpsc::channel();
        PageLedger {
            free: (0..page_count).collect(),
            return_tx,
            returns,
        }
    }

    /// Take a page out of circulation, reclaiming any returned ones first.
    fn reserve(&mut self) -> Option<usize> {
        while let Ok(index) = self.returns.try_recv() {
            self.free.push_back(index);
        }
        self.free.pop_front()
    }

    fn release(&mut self, index: usize) {
        self.free.push_back(index);
    }

    fn sender(&self) -> Sender<usize> {
        self.return_tx.clone()
    }
}

pub struct FrameProducer {
    display: Arc<Display>,
    window_id: u32,
    window: Arc<RwLock<Geometry>>,
    canvas: Canvas,
    pool: PagePool,
    pages: PageLedger,
    seg: shm::Seg,
    pixmap: u32,
    frames: HeapProd<Frame>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        display: Arc<Display>,
        window_id: u32,
        window: Arc<RwLock<Geometry>>,
        canvas: Canvas,
        pool: PagePool,
        seg: shm::Seg,
        pixmap: u32,
        frames: HeapProd<Frame>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        let pages = PageLedger::new(pool.page_count());
        FrameProducer {
            display,
            window_id,
            window,
            canvas,
            pool,
            pages,
            seg,
            pixmap,
            frames,
            dropped,
        }
    }

    /// Capture loop; returns when the signal channel closes or the stop
    /// flag is raised.
    pub fn run(&mut self, events: Receiver<CaptureEvent>, stop: &AtomicBool) {
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let event = match events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if let Err(e) = self.capture(event.resized) {
                log::warn!("capture skipped: {e}");
            }
        }
        log::debug!("producer stopped");
    }

    fn capture(&mut self, resized: bool) -> Result<(), DisplayError> {
        if resized {
            // the old pixmap still shows the pre-resize contents
            if let Err(e) = self.display.free_pixmap(self.pixmap) {
                log::debug!("free_pixmap failed: {e}");
            }
            self.pixmap = self.display.name_window_pixmap(self.window_id)?;
        }

        let geometry = *self.window.read().unwrap();
        let width = (geometry.width as u32).min(self.canvas.width) as u16;
        let height = (geometry.height as u32).min(self.canvas.height) as u16;

        let Some(mut index) = self.pages.reserve() else {
            // every page is still riding in a frame; the consumer will
            // duplicate until one comes back
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        if let Err(e) = self.display.shm_get_image(
            self.pixmap,
            geometry.border as i16,
            geometry.border as i16,
            width,
            height,
            self.seg,
            self.pool.offset(index) as u32,
        ) {
            self.pages.release(index);
            return Err(e);
        }

        if (width as u32) < self.canvas.width || (height as u32) < self.canvas.height {
            // window smaller than the canvas: re-stride the packed rows
            // into a second, zeroed page so the margins letterbox
            let Some(dst) = self.pages.reserve() else {
                self.pages.release(index);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            };
            let (src_page, dst_page) = self.pool.page_pair(index, dst);
            letterbox_rows(
                src_page,
                dst_page,
                height as usize,
                width as usize * BYTES_PER_PIXEL,
                self.canvas.width as usize * BYTES_PER_PIXEL,
            );
            // the packed original is no longer needed
            self.pages.release(index);
            index = dst;
        }

        if let Err(e) = self.overlay_cursor(geometry, index) {
            log::debug!("cursor overlay skipped: {e}");
        }

        let frame = Frame {
            page: self.pool.page_ref(index),
            index,
            return_tx: self.pages.sender(),
            time: Instant::now(),
        };
        if self.frames.try_push(frame).is_err() {
            // consumer still holds a frame; dropping this one frees its page
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn overlay_cursor(&mut self, geometry: Geometry, index: usize) -> Result<(), DisplayError> {
        let pointer = self.display.query_pointer(self.window_id)?;
        if !pointer.same_screen {
            return Ok(());
        }

        let cursor = self.display.cursor_image()?;
        let (x, y) = self.display.translate_coordinates(
            self.display.root(),
            self.window_id,
            cursor.x,
            cursor.y,
        )?;
        if !cursor_intersects_window(&cursor, x as i32, y as i32, geometry) {
            return Ok(());
        }

        let canvas = self.canvas;
        blend_cursor(self.pool.page_mut(index), canvas, &cursor, x as i32, y as i32);
        Ok(())
    }
}

/// Copy `rows` packed rows of `src_stride` bytes into a zeroed destination
/// with `dst_stride` row pitch.
fn letterbox_rows(src: &[u8], dst: &mut [u8], rows: usize, src_stride: usize, dst_stride: usize) {
    dst.fill(0);
    for row in 0..rows {
        dst[row * dst_stride..][..src_stride]
            .copy_from_slice(&src[row * src_stride..][..src_stride]);
    }
}

/// Whether any part of the cursor image, with its hotspot at `(x, y)` in
/// window coordinates, falls inside the window rectangle. The image extent
/// matters here, not the bare pointer position: a hotspot just outside the
/// window can still leave part of the bitmap over it.
fn cursor_intersects_window(cursor: &CursorImage, x: i32, y: i32, geometry: Geometry) -> bool {
    let left = x - cursor.xhot as i32;
    let top = y - cursor.yhot as i32;
    left < geometry.width as i32
        && top < geometry.height as i32
        && left + cursor.width as i32 > 0
        && top + cursor.height as i32 > 0
}

/// Alpha-blend the premultiplied ARGB cursor onto the BGRA canvas with the
/// hotspot at `(x, y)` in canvas coordinates. Rows and pixels running past
/// the bottom or right edge end the overlay; the part hanging off the top
/// or left is skipped pixel by pixel.
fn blend_cursor(canvas: &mut [u8], size: Canvas, cursor: &CursorImage, x: i32, y: i32) {
    let canvas_w = size.width as i32;
    let canvas_h = size.height as i32;
    for row in 0..cursor.height as i32 {
        let dy = row + y - cursor.yhot as i32;
        if dy >= canvas_h {
            break;
        }
        if dy < 0 {
            continue;
        }
        for col in 0..cursor.width as i32 {
            let dx = col + x - cursor.xhot as i32;
            if dx >= canvas_w {
                break;
            }
            if dx < 0 {
                continue;
            }
            let p = cursor.pixels[(row * cursor.width as i32 + col) as usize];
            let alpha = (p >> 24) + 1;
            let inv = 256 - (p >> 24);
            let offset = (dy * canvas_w + dx) as usize * BYTES_PER_PIXEL;
            let dst = &mut canvas[offset..offset + BYTES_PER_PIXEL];
            dst[0] = ((alpha * (p & 0xFF) + inv * dst[0] as u32) >> 8) as u8;
            dst[1] = ((alpha * (p >> 8 & 0xFF) + inv * dst[1] as u32) >> 8) as u8;
            dst[2] = ((alpha * (p >> 16 & 0xFF) + inv * dst[2] as u32) >> 8) as u8;
            dst[3] = 0xFF;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_of(pixels: Vec<u32>, width: u16, height: u16, xhot: u16, yhot: u16) -> CursorImage {
        CursorImage { pixels, width, height, xhot, yhot, x: 0, y: 0 }
    }

    fn geometry_of(width: u16, height: u16) -> Geometry {
        Geometry { width, height, border: 0 }
    }

    #[test]
    fn ledger_reserves_each_page_once() {
        let mut pages = PageLedger::new(3);
        assert_eq!(pages.reserve(), Some(0));
        assert_eq!(pages.reserve(), Some(1));
        assert_eq!(pages.reserve(), Some(2));
        assert_eq!(pages.reserve(), None);

        pages.release(1);
        assert_eq!(pages.reserve(), Some(1));
        assert_eq!(pages.reserve(), None);
    }

    #[test]
    fn dropping_a_frame_returns_its_page() {
        let pool = PagePool::new(16, 3).unwrap();
        let mut pages = PageLedger::new(pool.page_count());
        for _ in 0..pool.page_count() {
            pages.reserve().unwrap();
        }
        assert_eq!(pages.reserve(), None);

        let frame = Frame {
            page: pool.page_ref(2),
            index: 2,
            return_tx: pages.sender(),
            time: Instant::now(),
        };
        // still riding: the page stays out of circulation
        assert_eq!(pages.reserve(), None);
        drop(frame);
        assert_eq!(pages.reserve(), Some(2));
    }

    #[test]
    fn letterbox_zeroes_margins_and_keeps_rows() {
        // 2x2 source into a 4x3 canvas
        let src_stride = 2 * BYTES_PER_PIXEL;
        let dst_stride = 4 * BYTES_PER_PIXEL;
        let src: Vec<u8> = (1..=2 * 2 * BYTES_PER_PIXEL as u32).map(|v| v as u8).collect();
        let mut dst = vec![0xEEu8; 4 * 3 * BYTES_PER_PIXEL];

        letterbox_rows(&src, &mut dst, 2, src_stride, dst_stride);

        for row in 0..2 {
            assert_eq!(
                dst[row * dst_stride..][..src_stride],
                src[row * src_stride..][..src_stride]
            );
            assert!(dst[row * dst_stride + src_stride..(row + 1) * dst_stride]
                .iter()
                .all(|&b| b == 0));
        }
        assert!(dst[2 * dst_stride..].iter().all(|&b| b == 0));
    }

    #[test]
    fn overlay_gate_uses_the_image_extent_not_the_hotspot() {
        let geometry = geometry_of(100, 100);
        let cursor = cursor_of(vec![0; 32 * 32], 32, 32, 16, 16);

        // hotspot inside
        assert!(cursor_intersects_window(&cursor, 50, 50, geometry));
        // hotspot outside the right edge, bitmap still overlapping
        assert!(cursor_intersects_window(&cursor, 110, 50, geometry));
        // hotspot above the window, bitmap reaching down into it
        assert!(cursor_intersects_window(&cursor, 50, -10, geometry));
        // wholly off to the right
        assert!(!cursor_intersects_window(&cursor, 120, 50, geometry));
        // wholly above
        assert!(!cursor_intersects_window(&cursor, 50, -20, geometry));
        // bitmap corner just touching the window corner
        assert!(cursor_intersects_window(&cursor, -15, -15, geometry));
        assert!(!cursor_intersects_window(&cursor, -16, -16, geometry));
    }

    #[test]
    fn opaque_cursor_clips_at_canvas_edge() {
        // 4x4 opaque white cursor at (8, 8) on a 10x10 canvas
        let size = Canvas { width: 10, height: 10 };
        let mut canvas = vec![0u8; size.frame_bytes()];
        let cursor = cursor_of(vec![0xFFFF_FFFF; 16], 4, 4, 0, 0);

        blend_cursor(&mut canvas, size, &cursor, 8, 8);

        for row in 0..10usize {
            for col in 0..10usize {
                let px = &canvas[(row * 10 + col) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                if (8..10).contains(&row) && (8..10).contains(&col) {
                    assert_eq!(px, [0xFF; 4], "cursor pixel at ({row}, {col})");
                } else {
                    assert_eq!(px, [0; 4], "background at ({row}, {col})");
                }
            }
        }
    }

    #[test]
    fn cursor_overhanging_the_top_left_paints_the_visible_part() {
        let size = Canvas { width: 10, height: 10 };
        let mut canvas = vec![0u8; size.frame_bytes()];
        // 4x4 opaque white cursor with its hotspot at the window origin
        // and the image extending up and left of it
        let cursor = cursor_of(vec![0xFFFF_FFFF; 16], 4, 4, 2, 2);

        blend_cursor(&mut canvas, size, &cursor, 0, 0);

        for row in 0..10usize {
            for col in 0..10usize {
                let px = &canvas[(row * 10 + col) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                if row < 2 && col < 2 {
                    assert_eq!(px, [0xFF; 4], "visible quadrant at ({row}, {col})");
                } else {
                    assert_eq!(px, [0; 4], "background at ({row}, {col})");
                }
            }
        }
    }

    #[test]
    fn blend_matches_per_channel_formula() {
        let size = Canvas { width: 1, height: 1 };
        // background BGR (40, 80, 120), half-transparent red cursor pixel
        let mut canvas = vec![40, 80, 120, 7];
        let raw_alpha = 0x80u32;
        let p = raw_alpha << 24 | 0x60 << 16; // premultiplied R = 0x60
        let cursor = cursor_of(vec![p], 1, 1, 0, 0);

        blend_cursor(&mut canvas, size, &cursor, 0, 0);

        let alpha = raw_alpha + 1;
        let inv = 256 - raw_alpha;
        assert_eq!(canvas[0], ((inv * 40) >> 8) as u8);
        assert_eq!(canvas[1], ((inv * 80) >> 8) as u8);
        assert_eq!(canvas[2], ((alpha * 0x60 + inv * 120) >> 8) as u8);
        assert_eq!(canvas[3], 0xFF);
    }

    #[test]
    fn hotspot_offsets_the_cursor_origin() {
        let size = Canvas { width: 6, height: 6 };
        let mut canvas = vec![0u8; size.frame_bytes()];
        let cursor = cursor_of(vec![0xFFFF_FFFF; 4], 2, 2, 1, 1);

        blend_cursor(&mut canvas, size, &cursor, 3, 3);

        // hotspot (1,1) at (3,3) puts the image at rows/cols 2..4
        for row in 0..6usize {
            for col in 0..6usize {
                let px = &canvas[(row * 6 + col) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                if (2..4).contains(&row) && (2..4).contains(&col) {
                    assert_eq!(px, [0xFF; 4]);
                } else {
                    assert_eq!(px, [0; 4]);
                }
            }
        }
    }
}
