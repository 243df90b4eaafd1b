//! Matroska emission: the stream header once, then one Cluster per
//! presented frame.
//!
//! Emission lags one frame behind the pipeline: the writer keeps the most
//! recent pixels and presents them when the next frame (or duplicate tick)
//! fixes their duration. The first real frame is absorbed without output.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::ebml::{matroska as mkv, Encoder, UNKNOWN_SIZE};
use crate::video::codec::BitmapInfoHeader;
use crate::video::Canvas;

/// Track 1 as a varint, a zero relative timecode, keyframe flags.
const BLOCK_HEADER: [u8; 4] = [0x81, 0x00, 0x00, 0x80];

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Longest gap tolerated between emitted frames in variable-frame-rate
/// mode; beyond it a duplicate goes out so players do not stall and a
/// crash loses at most this much.
const MAX_FRAME_GAP: Duration = Duration::from_secs(1);

pub struct VideoWriter<W: Write> {
    enc: Encoder<W>,
    canvas: Canvas,
    fps: u32,
    cfr: bool,
    tags: Vec<(String, String)>,
    /// Block payload: 4-byte preamble + the previous frame's pixels.
    block: Vec<u8>,
    have_frame: bool,
    first_time: Instant,
    prev_time: Instant,
    idx: u64,
}

impl<W: Write> VideoWriter<W> {
    pub fn new(
        canvas: Canvas,
        fps: u32,
        cfr: bool,
        tags: Vec<(String, String)>,
        sink: W,
    ) -> Self {
        let now = Instant::now();
        let mut block = vec![0u8; BLOCK_HEADER.len() + canvas.frame_bytes()];
        block[..BLOCK_HEADER.len()].copy_from_slice(&BLOCK_HEADER);
        VideoWriter {
            enc: Encoder::new(sink),
            canvas,
            fps,
            cfr,
            tags,
            block,
            have_frame: false,
            first_time: now,
            prev_time: now,
            idx: 0,
        }
    }

    /// Emit the document header, open the unknown-size Segment, and write
    /// Info, Tags, and the single-track Tracks element.
    pub fn start(&mut self) -> io::Result<()> {
        let codec_private = BitmapInfoHeader::for_canvas(self.canvas).to_bytes();

        self.enc.emit(&mkv::ebml_header(vec![
            mkv::doc_type("matroska"),
            mkv::doc_type_version(4),
            mkv::doc_type_read_version(1),
        ]));

        let _ = self.enc.emit_header(mkv::SEGMENT, UNKNOWN_SIZE);

        self.enc.emit(&mkv::info(vec![
            mkv::timecode_scale(1), // timestamps in nanoseconds
            mkv::muxing_app("xwincap-mkv"),
            mkv::writing_app("xwincap"),
        ]));

        let tag_entries = self
            .tags
            .iter()
            .map(|(name, value)| {
                mkv::tag(vec![mkv::simple_tag(vec![
                    mkv::tag_name(name),
                    mkv::tag_string(value),
                ])])
            })
            .collect();
        self.enc.emit(&mkv::tags(tag_entries));

        self.enc.emit(&mkv::tracks(vec![mkv::track_entry(vec![
            mkv::track_number(1),
            mkv::track_uid(0xDEAD_BEEF),
            mkv::track_type(1),
            mkv::flag_lacing(0),
            mkv::default_duration(NANOS_PER_SEC / self.fps as u64),
            mkv::codec_id("V_MS/VFW/FOURCC"),
            mkv::codec_private(&codec_private),
            mkv::video(vec![
                mkv::pixel_width(self.canvas.width as u64),
                mkv::pixel_height(self.canvas.height as u64),
                mkv::colour_space(b"BGRA"),
                mkv::colour(vec![mkv::bits_per_channel(8)]),
            ]),
        ])]));

        self.enc.check()
    }

    /// Present the previous frame and store `pixels` for the next call.
    /// `None` is a tick without a fresh capture; whether a duplicate goes
    /// out then depends on the frame-rate mode. Returns whether a Cluster
    /// was emitted.
    pub fn send_frame(&mut self, pixels: Option<&[u8]>, time: Instant) -> io::Result<bool> {
        if !self.have_frame {
            if let Some(pixels) = pixels {
                // first frame: absorb it, emission starts on the next call
                self.block[BLOCK_HEADER.len()..].copy_from_slice(pixels);
                self.have_frame = true;
                self.first_time = time;
                self.prev_time = time;
                return self.enc.check().map(|()| false);
            }
        }

        if pixels.is_none() {
            // no new frame; in VFR only duplicate once the gap grows long
            if !self.cfr && time.saturating_duration_since(self.prev_time) < MAX_FRAME_GAP {
                return self.enc.check().map(|()| false);
            }
        } else if !self.cfr && time < self.prev_time {
            // a real capture stamped earlier than the duplicate just
            // emitted; drop it rather than write a backwards timestamp
            return self.enc.check().map(|()| false);
        }

        let timecode = if self.cfr {
            self.idx * (NANOS_PER_SEC / self.fps as u64)
        } else {
            self.prev_time.duration_since(self.first_time).as_nanos() as u64
        };
        let group = if self.cfr {
            mkv::block_group(vec![mkv::block(&self.block)])
        } else {
            let duration = time.saturating_duration_since(self.prev_time).as_nanos() as u64;
            mkv::block_group(vec![mkv::block_duration(duration), mkv::block(&self.block)])
        };
        self.enc.emit(&mkv::cluster(vec![
            mkv::timecode(timecode),
            mkv::position(0),
            group,
        ]));

        if let Some(pixels) = pixels {
            self.block[BLOCK_HEADER.len()..].copy_from_slice(pixels);
            self.have_frame = true;
        }
        self.prev_time = time;
        self.idx += 1;
        self.enc.check().map(|()| true)
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        self.enc.sink()
    }
}
