//! Fixed-rate presentation: one tick per nominal frame period, consuming a
//! captured frame when one is pending and presenting a duplicate
//! otherwise. Sole writer to the output sink.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringbuf::traits::Consumer as _;
use ringbuf::HeapCons;

use crate::capture::producer::Frame;
use crate::video::writer::VideoWriter;

pub fn run<W: Write>(
    mut writer: VideoWriter<W>,
    mut frames: HeapCons<Frame>,
    fps: u32,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
) -> io::Result<()> {
    let period = Duration::from_nanos(1_000_000_000 / fps as u64);
    let mut next = Instant::now() + period;
    let mut presented: u64 = 0;
    let mut duplicated: u64 = 0;
    let mut last_status = Instant::now();

    loop {
        let now = Instant::now();
        if now < next {
            thread::sleep(next - now);
        }
        next += period;

        let result = match frames.try_pop() {
            Some(frame) => {
                // SAFETY: the page is reserved to this frame until it is
                // dropped below, so the producer cannot rewrite it while
                // the writer copies it.
                let pixels = unsafe { frame.pixels() };
                presented += 1;
                writer.send_frame(Some(pixels), frame.time)
            }
            None => {
                let emitted = writer.send_frame(None, Instant::now());
                if let Ok(true) = emitted {
                    duplicated += 1;
                }
                emitted
            }
        };
        if let Err(e) = result {
            stop.store(true, Ordering::Relaxed);
            return Err(e);
        }

        if last_status.elapsed() >= Duration::from_secs(1) {
            log::info!(
                "frames={presented} dups={duplicated} drops={}",
                dropped.load(Ordering::Relaxed)
            );
            last_status = Instant::now();
        }

        // drain: the frame just presented completes before we exit
        if stop.load(Ordering::Relaxed) {
            break;
        }
    }
    Ok(())
}
