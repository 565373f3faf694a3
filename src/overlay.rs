//! Overlay scaler configuration
//!
//! Turns a source rectangle (16.16 buffer pixels), a destination rectangle
//! (screen pixels) and a colour space into overlay scaler register values.
//!
//! The scaler fetches every plane of a scan line into a small line buffer.
//! Strong minification is done by skipping source pixels on fetch
//! ("step by"), so the scale factor tables trade filter quality for line
//! buffer space. Vertically, lines are skipped by doubling the pitch.
//!
//! [`compute`] diffs the new state against the previous one so callers only
//! touch what changed. [`flip`] swaps buffers without redoing the geometry.

use log::{debug, warn};

use crate::{
    config::OverlayConfig,
    constants::*,
    errors::*,
    fixed::{ceil_shift, round_shift},
    register::*,
};


/// Source buffer pixel format
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorSpace {
    Rgb15,
    Rgb16,
    Rgb32,
    /// Packed 4:2:2
    Yuy2,
    /// Planar 4:2:0, Y plane plus two quarter size chroma planes
    Yuv12,
}

/// One scale factor table row
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScaleFactor {
    /// Largest horizontal increment (source per destination pixel, 4.12) handled
    pub max_scale: u32,
    /// Pixels fetched per group
    pub group_size: u32,
    /// Luma / RGB step: 0 and 1 fetch every pixel, `n` every 2^(n-1)th
    pub p1_step_by: u32,
    /// Chroma step
    pub p23_step_by: u32,
}

const fn sf(max_scale: u32, group_size: u32, p1_step_by: u32, p23_step_by: u32) -> ScaleFactor {
    ScaleFactor { max_scale, group_size, p1_step_by, p23_step_by }
}

const SCALE_RGB16: [ScaleFactor; 5] = [
    sf(4096, 2, 0, 0),
    sf(8192, 2, 1, 0),
    sf(16384, 2, 2, 0),
    sf(32768, 2, 3, 0),
    sf(65536, 2, 4, 0),
];

const SCALE_RGB32: [ScaleFactor; 5] = [
    sf(4096, 1, 0, 0),
    sf(8192, 1, 1, 0),
    sf(16384, 1, 2, 0),
    sf(32768, 1, 3, 0),
    sf(65536, 1, 4, 0),
];

const SCALE_YUV: [ScaleFactor; 5] = [
    sf(4096, 2, 0, 0),
    sf(8192, 4, 1, 1),
    sf(16384, 4, 2, 2),
    sf(32768, 4, 3, 3),
    sf(65536, 4, 4, 4),
];

const SCALE_YUV12: [ScaleFactor; 12] = [
    sf(4096, 2, 0, 0),
    sf(5461, 4, 1, 0),
    sf(5461, 2, 0, 1),
    sf(8192, 4, 1, 1),
    sf(10922, 4, 1, 2),
    sf(16384, 4, 2, 2),
    sf(21845, 4, 2, 3),
    sf(32768, 4, 3, 3),
    sf(43690, 4, 3, 4),
    sf(65536, 4, 4, 4),
    sf(87381, 4, 4, 5),
    sf(131072, 4, 5, 5),
];

impl ColorSpace {
    /// Scale factors, least aggressive first
    pub fn scale_factors(self) -> &'static [ScaleFactor] {
        match self {
            ColorSpace::Rgb15 | ColorSpace::Rgb16 => &SCALE_RGB16,
            ColorSpace::Rgb32 => &SCALE_RGB32,
            ColorSpace::Yuy2 => &SCALE_YUV,
            ColorSpace::Yuv12 => &SCALE_YUV12,
        }
    }

    /// Bytes per pixel of the first (or only) plane
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ColorSpace::Rgb15 | ColorSpace::Rgb16 | ColorSpace::Yuy2 => 2,
            ColorSpace::Rgb32 => 4,
            ColorSpace::Yuv12 => 1,
        }
    }

    /// Separate chroma planes
    pub fn chroma_planes(self) -> u32 {
        match self {
            ColorSpace::Yuv12 => 2,
            _ => 0,
        }
    }

    /// Horizontal / vertical chroma subsampling, as shifts
    fn chroma_shift(self) -> (u32, u32) {
        match self {
            ColorSpace::Yuy2 => (1, 0),
            ColorSpace::Yuv12 => (1, 1),
            _ => (0, 0),
        }
    }

    fn format_code(self) -> u32 {
        match self {
            ColorSpace::Rgb15 => 0x3,
            ColorSpace::Rgb16 => 0x4,
            ColorSpace::Rgb32 => 0x6,
            ColorSpace::Yuv12 => 0xa,
            ColorSpace::Yuy2 => 0xb,
        }
    }
}

/// Rectangle, right / bottom exclusive
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rect<T> {
    pub left: T,
    pub top: T,
    pub right: T,
    pub bottom: T,
}

/// Video buffer the overlay scans out of
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OverlayBuffer {
    pub base: u32,
    /// Bytes per line
    pub pitch: u32,
    pub chroma_base: [u32; 2],
    pub chroma_pitch: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OverlayRequest {
    /// Source, 16.16 buffer pixels
    pub source: Rect<u32>,
    /// Destination, screen pixels
    pub dest: Rect<i32>,
    /// Per edge destination growth, screen pixels; negative shrinks
    pub offsets: Rect<i32>,
    pub color_space: ColorSpace,
    pub buffer: OverlayBuffer,
}

/// Vertical filter mode
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VerticalFilter {
    FourTap,
    /// Lines are skipped, only two taps left
    TwoTapSkip,
}

/// Scaler setup of one plane group
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PlaneSetup {
    /// 4.12
    pub h_inc: u32,
    /// 4.12
    pub h_accum_init: u32,
    pub x_start: u32,
    pub x_end: u32,
    /// 4.12
    pub v_accum_init: u32,
    pub active_lines: u32,
    /// Bytes from the plane base to the first fetched pixel
    pub offset: u32,
    /// Register pitch, bytes
    pub pitch: u32,
}

/// Register state of a visible overlay, buffer addresses aside
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScalerSetup {
    pub color_space: ColorSpace,
    /// Clipped destination
    pub screen: Rect<i32>,
    pub scale: ScaleFactor,
    /// Effective horizontal increment after clamping, 4.12
    pub h_inc: u32,
    /// 12.20, after line skipping
    pub v_inc: u32,
    pub v_filter: VerticalFilter,
    pub p1: PlaneSetup,
    pub p23: PlaneSetup,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Hidden,
    Visible {
        setup: ScalerSetup,
        /// Base addresses of Y (or packed), U, V
        buffers: [u32; 3],
    },
}

impl Default for OverlayState {
    fn default() -> Self {
        OverlayState::Hidden
    }
}

/// What has to be written to get from one state to the next
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegisterDelta {
    Unchanged,
    Hide,
    /// Same geometry, new buffer addresses
    BufferOnly([u32; 3]),
    Full(ScalerSetup, [u32; 3]),
}

/// Number of overlay register writes for a full update
pub const OVERLAY_REGISTER_COUNT: usize = 20;


/// Computes the scaler state for `request` shown within `screen_clip`.
///
/// Returns [`OverlayState::Hidden`] when nothing is left after clipping.
pub fn configure(
    config: &OverlayConfig,
    request: &OverlayRequest,
    screen_clip: &Rect<i32>,
) -> Result<OverlayState> {
    let cs = request.color_space;
    let src = request.source;
    let dst = request.dest;

    if src.right <= src.left || src.bottom <= src.top || dst.right <= dst.left || dst.bottom <= dst.top {
        return Err(Error::InvalidSource);
    }

    let src_w = (src.right - src.left) as i64;
    let src_h = (src.bottom - src.top) as i64;
    let dst_w = (dst.right - dst.left) as i64;
    let dst_h = (dst.bottom - dst.top) as i64;

    // unclipped ratios, source per destination pixel
    let h_inc = (src_w / (dst_w << (16 - OV_H_INC_FRAC_BITS))) as u32;
    let v_inc = ((src_h << (OV_V_INC_FRAC_BITS - 16)) / dst_h) as u32;

    // destination pixels -> source 16.16
    let sx = |n: i64| n * src_w / dst_w;
    let sy = |n: i64| n * src_h / dst_h;

    let mut s = Rect {
        left: src.left as i64,
        top: src.top as i64,
        right: src.right as i64,
        bottom: src.bottom as i64,
    };
    let off = request.offsets;
    let mut d = Rect {
        left: dst.left as i64 - off.left as i64,
        top: dst.top as i64 - off.top as i64,
        right: dst.right as i64 + off.right as i64,
        bottom: dst.bottom as i64 + off.bottom as i64,
    };
    s.left -= sx(off.left as i64);
    s.top -= sy(off.top as i64);
    s.right += sx(off.right as i64);
    s.bottom += sy(off.bottom as i64);

    // screen registers are unsigned
    let clip = Rect {
        left: screen_clip.left.max(0),
        top: screen_clip.top.max(0),
        right: screen_clip.right,
        bottom: screen_clip.bottom,
    };
    if d.left < clip.left as i64 {
        s.left += sx(clip.left as i64 - d.left);
        d.left = clip.left as i64;
    }
    if d.top < clip.top as i64 {
        s.top += sy(clip.top as i64 - d.top);
        d.top = clip.top as i64;
    }
    if d.right > clip.right as i64 {
        s.right -= sx(d.right - clip.right as i64);
        d.right = clip.right as i64;
    }
    if d.bottom > clip.bottom as i64 {
        s.bottom -= sy(d.bottom - clip.bottom as i64);
        d.bottom = clip.bottom as i64;
    }

    // the source can't start before the buffer
    if s.left < 0 {
        let n = (-s.left * dst_w + src_w - 1) / src_w;
        d.left += n;
        s.left = (s.left + sx(n)).max(0);
    }
    if s.top < 0 {
        let n = (-s.top * dst_h + src_h - 1) / src_h;
        d.top += n;
        s.top = (s.top + sy(n)).max(0);
    }

    if d.left >= d.right || d.top >= d.bottom || s.left >= s.right || s.top >= s.bottom {
        debug!("overlay clipped away");
        return Ok(OverlayState::Hidden);
    }

    let x0 = (s.left >> 16) as u32;
    let x1 = ceil_shift(s.right as u64, 16) as u32;
    let y0 = (s.top >> 16) as u32;
    let y1 = ceil_shift(s.bottom as u64, 16) as u32;
    let width = x1 - x0;
    let lines = y1 - y0;

    let limit = config.revision.line_buffer_words();
    let (_, scale, h_inc) = select_scale_factor(cs, h_inc, width, limit);

    let mut v_inc = v_inc;
    let mut v_skip = 0;
    while v_inc >= 2 << OV_V_INC_FRAC_BITS {
        v_inc >>= 1;
        v_skip += 1;
    }
    let v_filter = if v_skip > 0 { VerticalFilter::TwoTapSkip } else { VerticalFilter::FourTap };

    let (ch, cv) = cs.chroma_shift();
    let buf = &request.buffer;

    let p1 = plane(
        &Plane {
            left: s.left as u64,
            top: s.top as u64,
            width,
            lines,
            h_inc,
            step_by: scale.p1_step_by,
            group_size: scale.group_size,
            h_shift: 0,
            v_shift: 0,
            v_skip,
            v_filter,
            bytes_per_pixel: cs.bytes_per_pixel(),
            pitch: buf.pitch,
        },
    );

    // packed formats fetch chroma along with luma
    let chroma_pitch = if cs.chroma_planes() > 0 { buf.chroma_pitch } else { buf.pitch };
    let chroma_bpp = if cs.chroma_planes() > 0 { 1 } else { cs.bytes_per_pixel() };
    let p23 = plane(
        &Plane {
            left: s.left as u64,
            top: s.top as u64,
            width,
            lines,
            h_inc,
            step_by: scale.p23_step_by,
            group_size: scale.group_size,
            h_shift: ch,
            v_shift: cv,
            v_skip,
            v_filter,
            bytes_per_pixel: chroma_bpp,
            pitch: chroma_pitch,
        },
    );

    let setup = ScalerSetup {
        color_space: cs,
        screen: Rect {
            left: d.left as i32,
            top: d.top as i32,
            right: d.right as i32,
            bottom: d.bottom as i32,
        },
        scale,
        h_inc,
        v_inc,
        v_filter,
        p1,
        p23,
    };
    debug!("overlay {:?}", setup);

    Ok(OverlayState::Visible { setup, buffers: setup.buffers(buf) })
}

/// Picks the least aggressive scale factor that handles `h_inc` (4.12) and
/// whose fetch of `width` source pixels fits `limit` line buffer words.
///
/// Falls back to the most aggressive row, clamping `h_inc` to what it handles.
/// Returns the row index, the row and the effective `h_inc`.
pub fn select_scale_factor(cs: ColorSpace, h_inc: u32, width: u32, limit: u32) -> (usize, ScaleFactor, u32) {
    let table = cs.scale_factors();
    for (i, row) in table.iter().enumerate() {
        if row.max_scale >= h_inc && line_buffer_words(cs, row, width) <= limit {
            return (i, *row, h_inc);
        }
    }

    let last = table.len() - 1;
    let row = table[last];
    warn!("overlay minification {} beyond scaler, clamped to {}", h_inc, row.max_scale);
    (last, row, h_inc.min(row.max_scale))
}

/// Line buffer words needed to fetch `width` source pixels with `row`
pub fn line_buffer_words(cs: ColorSpace, row: &ScaleFactor, width: u32) -> u32 {
    let p1_skip = row.p1_step_by.saturating_sub(1);
    let p1_bytes = ceil_shift(width as u64, p1_skip) as u32 * cs.bytes_per_pixel();
    let mut words = (p1_bytes + OV_LINE_BUFFER_WORD - 1) / OV_LINE_BUFFER_WORD;

    if cs.chroma_planes() > 0 {
        let (ch, _) = cs.chroma_shift();
        let p23_skip = row.p23_step_by.saturating_sub(1);
        let p23_bytes = ceil_shift(ceil_shift(width as u64, ch), p23_skip) as u32;
        words += cs.chroma_planes() * ((p23_bytes + OV_LINE_BUFFER_WORD - 1) / OV_LINE_BUFFER_WORD);
    }
    words
}

struct Plane {
    /// Source origin, 16.16 luma pixels
    left: u64,
    top: u64,
    /// Luma pixels / lines fetched
    width: u32,
    lines: u32,
    h_inc: u32,
    step_by: u32,
    group_size: u32,
    /// Subsampling of this plane relative to luma
    h_shift: u32,
    v_shift: u32,
    v_skip: u32,
    v_filter: VerticalFilter,
    bytes_per_pixel: u32,
    pitch: u32,
}

/// Filter precharge, 16.16
fn precharge(taps: u32) -> u64 {
    if taps >= 4 { 0x18000 } else { 0x8000 }
}

fn plane(p: &Plane) -> PlaneSetup {
    let skip = p.step_by.saturating_sub(1);
    let to_accum = 16 - OV_H_INC_FRAC_BITS;

    let left = p.left >> p.h_shift;
    let start = (left >> 16) as u32;
    let phase = start % p.group_size;
    let fetch = start - phase;
    let h_accum = round_shift(
        ((phase as u64) << 16) + (left & 0xffff) + precharge(p.group_size),
        to_accum + skip,
    );
    let width = ceil_shift(p.width as u64, p.h_shift) as u32;

    let top = p.top >> p.v_shift;
    let line = (top >> 16) as u32;
    let taps = match p.v_filter {
        VerticalFilter::FourTap => 4,
        VerticalFilter::TwoTapSkip => 2,
    };
    let v_accum = round_shift((top & 0xffff) + precharge(taps), to_accum + p.v_skip);
    let lines = ceil_shift(ceil_shift(p.lines as u64, p.v_shift), p.v_skip) as u32;

    PlaneSetup {
        h_inc: round_shift(p.h_inc as u64, skip + p.h_shift) as u32,
        h_accum_init: h_accum as u32,
        x_start: phase,
        x_end: phase + width - 1,
        v_accum_init: v_accum as u32,
        active_lines: lines,
        offset: line * p.pitch + fetch * p.bytes_per_pixel,
        pitch: p.pitch << p.v_skip,
    }
}

impl ScalerSetup {
    /// Plane addresses within `buffer`
    pub fn buffers(self: &Self, buffer: &OverlayBuffer) -> [u32; 3] {
        if self.color_space.chroma_planes() > 0 {
            [
                buffer.base.wrapping_add(self.p1.offset),
                buffer.chroma_base[0].wrapping_add(self.p23.offset),
                buffer.chroma_base[1].wrapping_add(self.p23.offset),
            ]
        } else {
            let base = buffer.base.wrapping_add(self.p1.offset);
            [base, base, base]
        }
    }

    /// Full register image, `(address, value)` in write order
    pub fn registers(self: &Self, buffers: &[u32; 3]) -> [(u32, u32); OVERLAY_REGISTER_COUNT] {
        let two_tap = self.v_filter == VerticalFilter::TwoTapSkip;
        let [b0, b1, b2] = buffer_registers(buffers);
        [
            Reg::<Ov0YXStart>::default()
                .set(ScreenX(self.screen.left.max(0) as u32))
                .set(ScreenY(self.screen.top.max(0) as u32))
                .write(),
            Reg::<Ov0YXEnd>::default()
                .set(ScreenX((self.screen.right.max(0) as u32).saturating_sub(1)))
                .set(ScreenY((self.screen.bottom.max(0) as u32).saturating_sub(1)))
                .write(),
            Reg::<Ov0VInc>::default().set(VInc(self.v_inc)).write(),
            Reg::<Ov0P1VAccumInit>::default().set(AccumInit(self.p1.v_accum_init)).write(),
            Reg::<Ov0P23VAccumInit>::default().set(AccumInit(self.p23.v_accum_init)).write(),
            Reg::<Ov0P1BlankLinesAtTop>::default().set(ActiveLines(self.p1.active_lines)).write(),
            Reg::<Ov0P23BlankLinesAtTop>::default().set(ActiveLines(self.p23.active_lines)).write(),
            b0,
            b1,
            b2,
            Reg::<Ov0VidBufPitch0Value>::default().set(Pitch(self.p1.pitch)).write(),
            Reg::<Ov0VidBufPitch1Value>::default().set(Pitch(self.p23.pitch)).write(),
            Reg::<Ov0HInc>::default()
                .set(P1HInc(self.p1.h_inc))
                .set(P23HInc(self.p23.h_inc))
                .write(),
            Reg::<Ov0StepBy>::default()
                .set(P1StepBy(self.scale.p1_step_by))
                .set(P23StepBy(self.scale.p23_step_by))
                .write(),
            Reg::<Ov0P1HAccumInit>::default().set(AccumInit(self.p1.h_accum_init)).write(),
            Reg::<Ov0P23HAccumInit>::default().set(AccumInit(self.p23.h_accum_init)).write(),
            Reg::<Ov0P1XStartEnd>::default()
                .set(XStart(self.p1.x_start))
                .set(XEnd(self.p1.x_end))
                .write(),
            Reg::<Ov0P2XStartEnd>::default()
                .set(XStart(self.p23.x_start))
                .set(XEnd(self.p23.x_end))
                .write(),
            Reg::<Ov0P3XStartEnd>::default()
                .set(XStart(self.p23.x_start))
                .set(XEnd(self.p23.x_end))
                .write(),
            // enable last
            Reg::<Ov0ScaleCntl>::default()
                .set(SourceFormat(self.color_space.format_code()))
                .set(VerticalTwoTap(two_tap))
                .set(ScalerEnable(true))
                .write(),
        ]
    }
}

/// Buffer base address writes
pub fn buffer_registers(buffers: &[u32; 3]) -> [(u32, u32); 3] {
    [
        Reg::<Ov0VidBuf0BaseAdrs>::default().set(BufferOffset(buffers[0])).write(),
        Reg::<Ov0VidBuf1BaseAdrs>::default().set(BufferOffset(buffers[1])).write(),
        Reg::<Ov0VidBuf2BaseAdrs>::default().set(BufferOffset(buffers[2])).write(),
    ]
}

/// Computes the new overlay state and what has to be written to get there
/// from `previous`.
pub fn compute(
    config: &OverlayConfig,
    request: &OverlayRequest,
    screen_clip: &Rect<i32>,
    previous: &OverlayState,
) -> Result<(RegisterDelta, OverlayState)> {
    let next = configure(config, request, screen_clip)?;

    let delta = match (previous, &next) {
        (OverlayState::Hidden, OverlayState::Hidden) => RegisterDelta::Unchanged,
        (_, OverlayState::Hidden) => RegisterDelta::Hide,
        (
            OverlayState::Visible { setup: old, buffers: old_buffers },
            OverlayState::Visible { setup, buffers },
        ) if old == setup => {
            if old_buffers == buffers {
                RegisterDelta::Unchanged
            } else {
                RegisterDelta::BufferOnly(*buffers)
            }
        }
        (_, OverlayState::Visible { setup, buffers }) => RegisterDelta::Full(*setup, *buffers),
    };

    Ok((delta, next))
}

/// Points a visible overlay at another buffer of the same layout.
///
/// Only the plane base addresses are recomputed, from the offsets kept in
/// the current setup. A hidden overlay stays hidden.
pub fn flip(previous: &OverlayState, buffer: &OverlayBuffer) -> (RegisterDelta, OverlayState) {
    match previous {
        OverlayState::Hidden => (RegisterDelta::Unchanged, OverlayState::Hidden),
        OverlayState::Visible { setup, buffers: old } => {
            let buffers = setup.buffers(buffer);
            let delta = if buffers == *old {
                RegisterDelta::Unchanged
            } else {
                RegisterDelta::BufferOnly(buffers)
            };
            (delta, OverlayState::Visible { setup: *setup, buffers })
        }
    }
}

/// Turns the overlay off
pub fn hide(previous: &OverlayState) -> (RegisterDelta, OverlayState) {
    match previous {
        OverlayState::Hidden => (RegisterDelta::Unchanged, OverlayState::Hidden),
        OverlayState::Visible { .. } => (RegisterDelta::Hide, OverlayState::Hidden),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayRevision;

    const SCREEN: Rect<i32> = Rect { left: 0, top: 0, right: 1024, bottom: 768 };

    fn px(x: u32) -> u32 {
        x << 16
    }

    fn yuv12_request(dest: Rect<i32>) -> OverlayRequest {
        OverlayRequest {
            source: Rect { left: 0, top: 0, right: px(720), bottom: px(480) },
            dest,
            offsets: Rect::default(),
            color_space: ColorSpace::Yuv12,
            buffer: OverlayBuffer {
                base: 0x10_0000,
                pitch: 720,
                chroma_base: [0x20_0000, 0x24_0000],
                chroma_pitch: 360,
            },
        }
    }

    fn visible(state: OverlayState) -> (ScalerSetup, [u32; 3]) {
        match state {
            OverlayState::Visible { setup, buffers } => (setup, buffers),
            OverlayState::Hidden => panic!("overlay hidden"),
        }
    }

    #[test]
    fn yuv12_half_size() {
        let req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        let (s, buffers) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());

        assert_eq!(s.h_inc, 8192);
        assert_eq!(s.scale, sf(8192, 4, 1, 1));
        assert_eq!(s.screen, Rect { left: 100, top: 100, right: 460, bottom: 340 });

        assert_eq!(s.p1.h_inc, 8192);
        assert_eq!(s.p23.h_inc, 4096);
        assert_eq!(s.p1.h_accum_init, 0x1800);
        assert_eq!((s.p1.x_start, s.p1.x_end), (0, 719));
        assert_eq!((s.p23.x_start, s.p23.x_end), (0, 359));

        // 2.0 vertically: every other line, pitch doubled
        assert_eq!(s.v_filter, VerticalFilter::TwoTapSkip);
        assert_eq!(s.v_inc, 1 << 20);
        assert_eq!(s.p1.pitch, 1440);
        assert_eq!(s.p23.pitch, 720);
        assert_eq!(s.p1.active_lines, 240);
        assert_eq!(s.p23.active_lines, 120);
        assert_eq!(s.p1.v_accum_init, 0x400);

        assert_eq!(buffers, [0x10_0000, 0x20_0000, 0x24_0000]);
    }

    #[test]
    fn magnification_keeps_four_tap() {
        let req = yuv12_request(Rect { left: 0, top: 0, right: 1024, bottom: 720 });
        let (s, _) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        assert_eq!(s.v_filter, VerticalFilter::FourTap);
        assert_eq!(s.v_inc, (480 << 20) / 720);
        assert_eq!(s.scale, SCALE_YUV12[0]);
        assert_eq!(s.p1.v_accum_init, 0x1800);
    }

    #[test]
    fn left_clip_moves_source() {
        let req = yuv12_request(Rect { left: -101, top: 0, right: 259, bottom: 240 });
        let (s, buffers) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());

        assert_eq!(s.screen.left, 0);
        // 101 destination pixels = 202 source pixels, fetch starts at group 200
        assert_eq!(s.p1.x_start, 2);
        assert_eq!(s.p1.x_end, 2 + 518 - 1);
        assert_eq!(s.p1.h_accum_init, 0x3800);
        assert_eq!(s.p1.offset, 200);
        assert_eq!(s.p23.x_start, 1);
        assert_eq!(s.p23.h_accum_init, 0x2800);
        assert_eq!(s.p23.offset, 100);
        assert_eq!(buffers, [0x10_0000 + 200, 0x20_0000 + 100, 0x24_0000 + 100]);
    }

    #[test]
    fn offsets_cannot_reach_before_the_buffer() {
        let mut req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        req.offsets = Rect { left: 10, top: 0, right: 0, bottom: 0 };
        let (s, _) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        assert_eq!(s.screen.left, 100);
        assert_eq!(s.p1.offset, 0);
    }

    #[test]
    fn offsets_grow_destination_into_source() {
        let mut req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        req.source.left = px(40);
        req.source.right = px(760);
        req.offsets = Rect { left: 10, top: 0, right: 0, bottom: 0 };
        let (s, _) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        assert_eq!(s.screen.left, 90);
        // 10 destination pixels at 2:1
        assert_eq!(s.p1.offset, 20);
    }

    #[test]
    fn off_screen_is_hidden() {
        let req = yuv12_request(Rect { left: 1100, top: 100, right: 1460, bottom: 340 });
        assert_eq!(
            configure(&OverlayConfig::default(), &req, &SCREEN),
            Ok(OverlayState::Hidden)
        );
    }

    #[test]
    fn empty_source_is_invalid() {
        let mut req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        req.source.right = req.source.left;
        assert_eq!(
            configure(&OverlayConfig::default(), &req, &SCREEN),
            Err(Error::InvalidSource)
        );
    }

    #[test]
    fn strong_minification_is_clamped() {
        let mut req = yuv12_request(Rect { left: 0, top: 0, right: 20, bottom: 240 });
        req.source.right = px(1280);
        let (s, _) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        assert_eq!(s.scale, SCALE_YUV12[SCALE_YUV12.len() - 1]);
        assert_eq!(s.h_inc, 131072);
        assert!(s.p1.h_inc < 1 << 14);
    }

    #[test]
    fn wide_source_skips_to_fit_line_buffer() {
        let words = |rev| {
            let (_, row, _) = select_scale_factor(ColorSpace::Yuv12, 4096, 1920, OverlayRevision::line_buffer_words(rev));
            row
        };
        assert_eq!(words(OverlayRevision::R100), sf(21845, 4, 2, 3));
        assert_eq!(words(OverlayRevision::R200), sf(16384, 4, 2, 2));
        assert_eq!(line_buffer_words(ColorSpace::Yuv12, &sf(21845, 4, 2, 3), 1920), 90);
    }

    #[test]
    fn scale_factor_lookup_is_monotonic() {
        for &cs in &[ColorSpace::Rgb16, ColorSpace::Rgb32, ColorSpace::Yuy2, ColorSpace::Yuv12] {
            for &width in &[64u32, 720, 1920] {
                let mut last = 0;
                for h_inc in (1024 ..= 140_000).step_by(97) {
                    let (i, _, _) = select_scale_factor(cs, h_inc, width, 96);
                    assert!(i >= last, "{:?} width {} h_inc {}", cs, width, h_inc);
                    last = i;
                }
            }
        }
    }

    #[test]
    fn rgb_planes_share_the_buffer() {
        let req = OverlayRequest {
            source: Rect { left: 0, top: px(10), right: px(320), bottom: px(250) },
            dest: Rect { left: 0, top: 0, right: 640, bottom: 480 },
            offsets: Rect::default(),
            color_space: ColorSpace::Rgb32,
            buffer: OverlayBuffer { base: 0x8000, pitch: 1280, chroma_base: [0; 2], chroma_pitch: 0 },
        };
        let (s, buffers) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        assert_eq!(s.h_inc, 2048);
        assert_eq!(s.p1.offset, 10 * 1280);
        assert_eq!(buffers, [0x8000 + 12800; 3]);
        assert_eq!(s.p23, s.p1);
    }

    #[test]
    fn buffer_flip_only_rewrites_bases() {
        let cfg = OverlayConfig::default();
        let mut req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });

        let (delta, state) = compute(&cfg, &req, &SCREEN, &OverlayState::Hidden).unwrap();
        assert!(matches!(delta, RegisterDelta::Full(..)));

        let (delta, same) = compute(&cfg, &req, &SCREEN, &state).unwrap();
        assert_eq!(delta, RegisterDelta::Unchanged);
        assert_eq!(same, state);

        req.buffer.base = 0x30_0000;
        req.buffer.chroma_base = [0x40_0000, 0x44_0000];
        let (delta, flipped) = compute(&cfg, &req, &SCREEN, &state).unwrap();
        assert_eq!(delta, RegisterDelta::BufferOnly([0x30_0000, 0x40_0000, 0x44_0000]));

        let (delta, hidden) = hide(&flipped);
        assert_eq!(delta, RegisterDelta::Hide);
        assert_eq!(hide(&hidden), (RegisterDelta::Unchanged, OverlayState::Hidden));
    }

    #[test]
    fn flip_reuses_the_setup() {
        let cfg = OverlayConfig::default();
        let req = yuv12_request(Rect { left: -101, top: 0, right: 259, bottom: 240 });
        let (_, state) = compute(&cfg, &req, &SCREEN, &OverlayState::Hidden).unwrap();

        let next = OverlayBuffer { base: 0x30_0000, chroma_base: [0x40_0000, 0x44_0000], ..req.buffer };
        let (delta, flipped) = flip(&state, &next);
        // clip offsets carried over from the stored setup
        assert_eq!(delta, RegisterDelta::BufferOnly([0x30_0000 + 200, 0x40_0000 + 100, 0x44_0000 + 100]));
        assert_eq!(visible(flipped).0, visible(state).0);

        // same as a full recompute against the new buffer
        let mut moved = req;
        moved.buffer = next;
        assert_eq!(compute(&cfg, &moved, &SCREEN, &state), Ok((delta, flipped)));

        assert_eq!(flip(&flipped, &next), (RegisterDelta::Unchanged, flipped));
        assert_eq!(flip(&OverlayState::Hidden, &next), (RegisterDelta::Unchanged, OverlayState::Hidden));
    }

    #[test]
    fn negative_clip_is_limited_to_the_screen() {
        let clip = Rect { left: -100, top: -50, right: 1024, bottom: 768 };
        let req = yuv12_request(Rect { left: -100, top: 0, right: 0, bottom: 240 });
        assert_eq!(configure(&OverlayConfig::default(), &req, &clip), Ok(OverlayState::Hidden));

        let req = yuv12_request(Rect { left: -100, top: -50, right: 260, bottom: 190 });
        let (s, buffers) = visible(configure(&OverlayConfig::default(), &req, &clip).unwrap());
        assert_eq!(s.screen, Rect { left: 0, top: 0, right: 260, bottom: 190 });
        let regs = s.registers(&buffers);
        assert_eq!(regs[0], (Ov0YXStart::ADDR, 0));
        assert_eq!(regs[1], (Ov0YXEnd::ADDR, 189 << 16 | 259));
    }

    #[test]
    fn moving_off_screen_hides() {
        let cfg = OverlayConfig::default();
        let req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        let (_, state) = compute(&cfg, &req, &SCREEN, &OverlayState::Hidden).unwrap();

        let gone = yuv12_request(Rect { left: 100, top: 800, right: 460, bottom: 1040 });
        assert_eq!(
            compute(&cfg, &gone, &SCREEN, &state),
            Ok((RegisterDelta::Hide, OverlayState::Hidden))
        );
    }

    #[test]
    fn register_image() {
        let req = yuv12_request(Rect { left: 100, top: 100, right: 460, bottom: 340 });
        let (s, buffers) = visible(configure(&OverlayConfig::default(), &req, &SCREEN).unwrap());
        let regs = s.registers(&buffers);

        assert_eq!(regs[0], (Ov0YXStart::ADDR, 100 << 16 | 100));
        assert_eq!(regs[1], (Ov0YXEnd::ADDR, 339 << 16 | 459));
        assert_eq!(regs[7], (Ov0VidBuf0BaseAdrs::ADDR, 0x10_0000));
        assert_eq!(regs[12], (Ov0HInc::ADDR, 4096 << 16 | 8192));
        assert_eq!(regs[13], (Ov0StepBy::ADDR, 1 << 8 | 1));
        let (addr, cntl) = regs[OVERLAY_REGISTER_COUNT - 1];
        assert_eq!(addr, Ov0ScaleCntl::ADDR);
        assert_eq!(cntl, 1 << 30 | 1 << 20 | 0xa << 8);
    }
}
