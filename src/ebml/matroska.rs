//! Named constructors for the Matroska element subset this tool emits.
//!
//! Mapping only: each function pairs a class ID with a payload kind. Child
//! sets are not validated; callers nest elements per the Matroska spec.

use super::Element;

pub const EBML: u64 = 0x1A45_DFA3;
pub const DOC_TYPE: u64 = 0x4282;
pub const DOC_TYPE_VERSION: u64 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u64 = 0x4285;

pub const SEGMENT: u64 = 0x1853_8067;

pub const INFO: u64 = 0x1549_A966;
pub const TIMECODE_SCALE: u64 = 0x2A_D7B1;
pub const MUXING_APP: u64 = 0x4D80;
pub const WRITING_APP: u64 = 0x5741;

pub const TAGS: u64 = 0x1254_C367;
pub const TAG: u64 = 0x7373;
pub const SIMPLE_TAG: u64 = 0x67C8;
pub const TAG_NAME: u64 = 0x45A3;
pub const TAG_STRING: u64 = 0x4487;

pub const TRACKS: u64 = 0x1654_AE6B;
pub const TRACK_ENTRY: u64 = 0xAE;
pub const TRACK_NUMBER: u64 = 0xD7;
pub const TRACK_UID: u64 = 0x73C5;
pub const TRACK_TYPE: u64 = 0x83;
pub const FLAG_LACING: u64 = 0x9C;
pub const DEFAULT_DURATION: u64 = 0x23_E383;
pub const CODEC_ID: u64 = 0x86;
pub const CODEC_PRIVATE: u64 = 0x63A2;
pub const VIDEO: u64 = 0xE0;
pub const PIXEL_WIDTH: u64 = 0xB0;
pub const PIXEL_HEIGHT: u64 = 0xBA;
pub const COLOUR_SPACE: u64 = 0x2E_B524;
pub const COLOUR: u64 = 0x55B0;
pub const BITS_PER_CHANNEL: u64 = 0x55B2;

pub const CLUSTER: u64 = 0x1F43_B675;
pub const TIMECODE: u64 = 0xE7;
pub const POSITION: u64 = 0xA7;
pub const BLOCK_GROUP: u64 = 0xA0;
pub const BLOCK: u64 = 0xA1;
pub const BLOCK_DURATION: u64 = 0x9B;

pub fn ebml_header(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(EBML, children)
}

pub fn doc_type(s: &str) -> Element<'_> {
    Element::ascii(DOC_TYPE, s)
}

pub fn doc_type_version(v: u64) -> Element<'static> {
    Element::uint(DOC_TYPE_VERSION, v)
}

pub fn doc_type_read_version(v: u64) -> Element<'static> {
    Element::uint(DOC_TYPE_READ_VERSION, v)
}

pub fn info(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(INFO, children)
}

pub fn timecode_scale(v: u64) -> Element<'static> {
    Element::uint(TIMECODE_SCALE, v)
}

pub fn muxing_app(s: &str) -> Element<'_> {
    Element::utf8(MUXING_APP, s)
}

pub fn writing_app(s: &str) -> Element<'_> {
    Element::utf8(WRITING_APP, s)
}

pub fn tags(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(TAGS, children)
}

pub fn tag(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(TAG, children)
}

pub fn simple_tag(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(SIMPLE_TAG, children)
}

pub fn tag_name(s: &str) -> Element<'_> {
    Element::utf8(TAG_NAME, s)
}

pub fn tag_string(s: &str) -> Element<'_> {
    Element::utf8(TAG_STRING, s)
}

pub fn tracks(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(TRACKS, children)
}

pub fn track_entry(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(TRACK_ENTRY, children)
}

pub fn track_number(v: u64) -> Element<'static> {
    Element::uint(TRACK_NUMBER, v)
}

pub fn track_uid(v: u64) -> Element<'static> {
    Element::uint(TRACK_UID, v)
}

pub fn track_type(v: u64) -> Element<'static> {
    Element::uint(TRACK_TYPE, v)
}

pub fn flag_lacing(v: u64) -> Element<'static> {
    Element::uint(FLAG_LACING, v)
}

pub fn default_duration(nanos: u64) -> Element<'static> {
    Element::uint(DEFAULT_DURATION, nanos)
}

pub fn codec_id(s: &str) -> Element<'_> {
    Element::ascii(CODEC_ID, s)
}

pub fn codec_private(b: &[u8]) -> Element<'_> {
    Element::binary(CODEC_PRIVATE, b)
}

pub fn video(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(VIDEO, children)
}

pub fn pixel_width(v: u64) -> Element<'static> {
    Element::uint(PIXEL_WIDTH, v)
}

pub fn pixel_height(v: u64) -> Element<'static> {
    Element::uint(PIXEL_HEIGHT, v)
}

pub fn colour_space(b: &[u8]) -> Element<'_> {
    Element::binary(COLOUR_SPACE, b)
}

pub fn colour(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(COLOUR, children)
}

pub fn bits_per_channel(v: u64) -> Element<'static> {
    Element::uint(BITS_PER_CHANNEL, v)
}

pub fn cluster(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(CLUSTER, children)
}

pub fn timecode(v: u64) -> Element<'static> {
    Element::uint(TIMECODE, v)
}

pub fn position(v: u64) -> Element<'static> {
    Element::uint(POSITION, v)
}

pub fn block_group(children: Vec<Element<'_>>) -> Element<'_> {
    Element::master(BLOCK_GROUP, children)
}

pub fn block(payload: &[u8]) -> Element<'_> {
    Element::binary(BLOCK, payload)
}

pub fn block_duration(nanos: u64) -> Element<'static> {
    Element::uint(BLOCK_DURATION, nanos)
}
