//! Capture pipeline wiring and lifecycle.
//!
//! Flow: display events fan in to a capture signal; the producer snapshots
//! window pixels into the shared page pool; the timing loop presents pages
//! through the Matroska writer onto standard output.

pub mod display;
pub mod events;
pub mod producer;

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use ringbuf::traits::Split;
use ringbuf::HeapRb;

use crate::shm::PagePool;
use crate::video::timing;
use crate::video::writer::VideoWriter;
use crate::video::Canvas;
use display::Display;
use events::CaptureEvent;
use producer::{Frame, FrameProducer};

/// Pool pages: one pending at the timing loop, one still being read there,
/// and the two a letterboxed capture fills. The producer reserves pages
/// explicitly and a page rides with its frame until presented, so running
/// out only skips a capture, never recycles a page still in flight.
const PAGE_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Initialising,
    Running,
    Draining,
    Terminated,
}

pub struct Config {
    pub window: u32,
    pub fps: u32,
    pub size: Option<Canvas>,
    pub cfr: bool,
    pub tags: Vec<(String, String)>,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let mut state = RunState::Initialising;
    log::debug!("state: {state:?}");

    let display = Arc::new(Display::open().context("display handshake failed")?);
    let geometry = display
        .get_geometry(cfg.window)
        .context("cannot query window geometry")?;
    let canvas = cfg.size.unwrap_or(Canvas {
        width: geometry.width as u32,
        height: geometry.height as u32,
    });

    display
        .redirect_window(cfg.window)
        .context("cannot redirect window")?;
    display
        .watch_structure(cfg.window)
        .context("cannot subscribe to resize notifications")?;
    let damage_id = display
        .create_damage(cfg.window)
        .context("cannot subscribe to damage notifications")?;

    let pool = PagePool::new(canvas.frame_bytes(), PAGE_COUNT)
        .context("cannot allocate shared memory")?;
    let seg = display
        .attach_shm(pool.id())
        .context("cannot attach shared memory to the display")?;
    let pixmap = display
        .name_window_pixmap(cfg.window)
        .context("cannot bind the window pixmap")?;

    let mut writer = VideoWriter::new(canvas, cfg.fps, cfg.cfr, cfg.tags, io::stdout());
    writer.start().context("cannot write the stream header")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("cannot install the signal handler")?;
    }

    let window = Arc::new(RwLock::new(geometry));
    let (resize_tx, resize_rx) = mpsc::channel();
    let (damage_tx, damage_rx) = mpsc::channel();
    let (capture_tx, capture_rx) = mpsc::sync_channel::<CaptureEvent>(1);
    let (frame_tx, frame_rx) = HeapRb::<Frame>::new(1).split();
    let dropped = Arc::new(AtomicU64::new(0));
    let period = Duration::from_nanos(1_000_000_000 / cfg.fps as u64);

    state = RunState::Running;
    log::debug!("state: {state:?}");
    log::info!(
        "capturing window {:#x} at {}x{}, {} fps, {}",
        cfg.window,
        canvas.width,
        canvas.height,
        cfg.fps,
        if cfg.cfr { "cfr" } else { "vfr" }
    );

    // The event reader and the two monitors block in wait_for_event/recv
    // with no cancellation point; they are left detached and die with the
    // process.
    {
        let display = display.clone();
        let stop = stop.clone();
        thread::Builder::new()
            .name("x11-events".into())
            .spawn(move || events::run_event_reader(display, damage_id, resize_tx, damage_tx, stop))
            .context("cannot spawn the event reader")?;
    }
    {
        let window = window.clone();
        let capture_tx = capture_tx.clone();
        thread::Builder::new()
            .name("resize-monitor".into())
            .spawn(move || events::run_resize_monitor(resize_rx, window, capture_tx))
            .context("cannot spawn the resize monitor")?;
    }
    {
        let display = display.clone();
        let window = window.clone();
        let capture_tx = capture_tx.clone();
        let stop = stop.clone();
        let window_id = cfg.window;
        thread::Builder::new()
            .name("damage-cursor".into())
            .spawn(move || {
                events::run_damage_cursor(
                    damage_rx, display, window_id, window, capture_tx, period, stop,
                )
            })
            .context("cannot spawn the damage monitor")?;
    }

    let timing = {
        let stop = stop.clone();
        let dropped = dropped.clone();
        let fps = cfg.fps;
        thread::Builder::new()
            .name("frame-timing".into())
            .spawn(move || timing::run(writer, frame_rx, fps, stop, dropped))
            .context("cannot spawn the timing loop")?
    };

    // capture the first frame right away instead of waiting for damage
    let _ = capture_tx.try_send(CaptureEvent { resized: false });
    drop(capture_tx);

    let mut producer = FrameProducer::new(
        display, cfg.window, window, canvas, pool, seg, pixmap, frame_tx, dropped,
    );
    producer.run(capture_rx, &stop);

    state = RunState::Draining;
    log::debug!("state: {state:?}");
    stop.store(true, Ordering::Relaxed);

    let result = timing
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("timing loop panicked")));
    state = RunState::Terminated;
    log::debug!("state: {state:?}");
    result.context("stream write failed")?;
    Ok(())
}
