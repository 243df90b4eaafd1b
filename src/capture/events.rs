//! Fan-in of resize, damage, and cursor-motion signals into one coalescing
//! capture channel.
//!
//! Every source pushes into a depth-1 channel with a non-blocking send, so
//! event storms collapse into a single pending capture. Dropped signals are
//! harmless: the producer always snapshots live display state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use x11rb::protocol::damage;
use x11rb::protocol::Event;

use super::display::{Display, Geometry};

#[derive(Debug, Clone, Copy)]
pub struct CaptureEvent {
    pub resized: bool,
}

/// Blocking X event reader; the only caller of `wait_for_event`.
/// Demultiplexes resize and damage notifications to their monitors.
pub fn run_event_reader(
    display: Arc<Display>,
    damage_id: damage::Damage,
    resize_tx: Sender<Geometry>,
    damage_tx: Sender<()>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let event = match display.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                log::error!("display event wait failed: {e}");
                stop.store(true, Ordering::Relaxed);
                break;
            }
        };
        match event {
            Event::ConfigureNotify(e) => {
                let geometry = Geometry {
                    width: e.width,
                    height: e.height,
                    border: e.border_width,
                };
                if resize_tx.send(geometry).is_err() {
                    break;
                }
            }
            Event::DamageNotify(_) => {
                if let Err(e) = display.subtract_damage(damage_id) {
                    log::warn!("damage subtract failed: {e}");
                }
                if damage_tx.send(()).is_err() {
                    break;
                }
            }
            _ => {}
        }
    }
    log::debug!("event reader stopped");
}

/// Updates the shared window geometry and requests a capture with a fresh
/// pixmap whenever the reported dimensions actually change.
pub fn run_resize_monitor(
    resize_rx: Receiver<Geometry>,
    window: Arc<RwLock<Geometry>>,
    capture_tx: SyncSender<CaptureEvent>,
) {
    let mut last = *window.read().unwrap();
    while let Ok(geometry) = resize_rx.recv() {
        if geometry == last {
            continue;
        }
        log::debug!(
            "window resized to {}x{} (border {})",
            geometry.width,
            geometry.height,
            geometry.border
        );
        *window.write().unwrap() = geometry;
        last = geometry;
        let _ = capture_tx.try_send(CaptureEvent { resized: true });
    }
    log::debug!("resize monitor stopped");
}

/// Cursor-motion edge detector fed by pointer samples.
pub struct CursorTracker {
    last: Option<(i16, i16)>,
    inside: bool,
}

impl CursorTracker {
    pub fn new() -> Self {
        CursorTracker { last: None, inside: false }
    }

    /// Whether this sample warrants a new capture: motion while inside the
    /// window, or the first sample after leaving it (to erase the stale
    /// overlay). Motion while outside is ignored.
    pub fn observe(&mut self, pos: (i16, i16), inside: bool) -> bool {
        let moved = self.last != Some(pos);
        self.last = Some(pos);
        let fire = if inside { moved } else { self.inside };
        self.inside = inside;
        fire
    }
}

/// Forwards damage notifications and polls the pointer once per nominal
/// frame period (`recv_timeout` doubles as the poll ticker).
pub fn run_damage_cursor(
    damage_rx: Receiver<()>,
    display: Arc<Display>,
    window_id: u32,
    window: Arc<RwLock<Geometry>>,
    capture_tx: SyncSender<CaptureEvent>,
    period: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut tracker = CursorTracker::new();
    let mut last_poll = Instant::now();
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let wait = period.saturating_sub(last_poll.elapsed());
        match damage_rx.recv_timeout(wait) {
            Ok(()) => {
                let _ = capture_tx.try_send(CaptureEvent { resized: false });
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        // poll the pointer once per period even while damage streams in
        if last_poll.elapsed() < period {
            continue;
        }
        last_poll = Instant::now();
        let pointer = match display.query_pointer(window_id) {
            Ok(pointer) => pointer,
            Err(e) => {
                log::warn!("pointer query failed: {e}");
                continue;
            }
        };
        let geometry = *window.read().unwrap();
        let inside = pointer.same_screen
            && pointer.x >= 0
            && (pointer.x as u16) < geometry.width
            && pointer.y >= 0
            && (pointer.y as u16) < geometry.height;
        if tracker.observe((pointer.x, pointer.y), inside) {
            let _ = capture_tx.try_send(CaptureEvent { resized: false });
        }
    }
    log::debug!("damage/cursor monitor stopped");
}
