//! CRT display timing and frame rate matching against the TV encoder
//!
//! The TV encoder and the CRTC feeding it run from two independent PLLs.
//! Unless both produce frames at exactly the same rate the picture slowly
//! rolls, so the CRT mode gets detuned by a few lines/pixels until the CRT
//! PLL can reproduce the TV frame rate closely enough.

use log::{debug, trace, warn};

use crate::{errors::*, pll::*, register::*};


/// One axis of a display mode, all values in pixels (lines)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Timings {
    pub display: u32,
    pub sync_start: u32,
    pub sync_end: u32,
    pub total: u32,
}

impl Timings {
    /// `display <= sync_start <= sync_end <= total`, non-empty
    pub fn is_valid(self: &Self) -> bool {
        self.display > 0
            && self.display <= self.sync_start
            && self.sync_start <= self.sync_end
            && self.sync_end <= self.total
    }
}

/// Sync pulse polarity
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncPolarity {
    Negative,
    Positive,
}

impl Default for SyncPolarity {
    fn default() -> Self {
        SyncPolarity::Negative
    }
}

/// CRT display mode
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DisplayTiming {
    pub horizontal: Timings,
    pub vertical: Timings,
    /// Pixel clock, Hz
    pub pixel_clock: u32,
    pub h_sync: SyncPolarity,
    pub v_sync: SyncPolarity,
}

impl DisplayTiming {
    pub fn validate(self: &Self) -> Result<()> {
        if self.horizontal.is_valid() && self.vertical.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidTiming)
        }
    }

    /// Pixels per frame
    pub fn frame_size(self: &Self) -> u64 {
        self.horizontal.total as u64 * self.vertical.total as u64
    }

    /// CRTC2 register words, `(address, value)`
    pub fn crtc_words(self: &Self) -> [(u32, u32); 4] {
        let (h, v) = (&self.horizontal, &self.vertical);
        [
            Reg::<Crtc2HTotalDisp>::default()
                .set(CrtcTotal(h.total.saturating_sub(1)))
                .set(CrtcDisplay(h.display.saturating_sub(1)))
                .write(),
            Reg::<Crtc2HSyncStrtWid>::default()
                .set(CrtcSyncStart(h.sync_start))
                .set(CrtcSyncWidth(h.sync_end.saturating_sub(h.sync_start)))
                .set(CrtcSyncNegative(self.h_sync == SyncPolarity::Negative))
                .write(),
            Reg::<Crtc2VTotalDisp>::default()
                .set(CrtcTotal(v.total.saturating_sub(1)))
                .set(CrtcDisplay(v.display.saturating_sub(1)))
                .write(),
            Reg::<Crtc2VSyncStrtWid>::default()
                .set(CrtcSyncStart(v.sync_start))
                .set(CrtcSyncWidth(v.sync_end.saturating_sub(v.sync_start)))
                .set(CrtcSyncNegative(self.v_sync == SyncPolarity::Negative))
                .write(),
        ]
    }
}

/// How far the CRT mode may be detuned and how close it must get.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TweakBounds {
    /// Lines added to / removed from the vertical total
    pub max_v_tweak: u32,
    /// Pixels added to / removed from the horizontal total
    pub max_h_tweak: u32,
    /// Allowed drift, TV pixels per frame
    pub max_drift: u32,
}

/// Detunes `mode` until `pll` reproduces the TV frame rate.
///
/// `tv_pix_per_frame` and `tv_freq` (Hz, as achieved by the TV PLL) describe
/// the encoder's frame. Candidates are tried in a fixed order: vertical
/// tweak 0, 1, ... (minus before plus), and for each of them horizontal
/// tweak 0, 1, ... (minus before plus). The first candidate whose drift is
/// within `bounds.max_drift` wins, so an untweaked mode is kept if it fits.
///
/// The returned mode carries the ideal pixel clock; the dividers carry the
/// one actually achieved.
pub fn reconcile(
    pll: &PllConstraints,
    mode: &DisplayTiming,
    tv_pix_per_frame: u32,
    tv_freq: u32,
    bounds: &TweakBounds,
    fixed_post_div: Option<u32>,
) -> Result<(DisplayTiming, PllDividers)> {
    mode.validate()?;

    let mut solved_any = false;
    let mut no_solution = None;

    for v_tweak in 0 ..= bounds.max_v_tweak {
        for &v_dir in &[-1i64, 1] {
            let v_total = mode.vertical.total as i64 + v_dir * v_tweak as i64;
            if v_total < mode.vertical.sync_end as i64 {
                continue;
            }

            for h_tweak in 0 ..= bounds.max_h_tweak {
                for &h_dir in &[-1i64, 1] {
                    let h_total = mode.horizontal.total as i64 + h_dir * h_tweak as i64;
                    if h_total < mode.horizontal.sync_end as i64 {
                        continue;
                    }

                    // the TV is interlaced and shows one field, i.e. half a frame,
                    // per CRT frame:
                    //   crt_freq = tv_freq * crt_pix_per_frame / (tv_pix_per_frame / 2)
                    let pix_per_crt_frame = (v_total * h_total) as u64;
                    let crt_freq = (tv_freq as u64 * pix_per_crt_frame * 2
                        / tv_pix_per_frame as u64) as u32;

                    let dividers = match pll.solve(crt_freq, fixed_post_div) {
                        Ok(d) => d,
                        Err(e) => {
                            trace!("no dividers for {}x{} @ {} Hz", h_total, v_total, crt_freq);
                            no_solution = Some(e);
                            continue;
                        }
                    };

                    solved_any = true;
                    let drift = dividers.freq.abs_diff(crt_freq) as u64
                        * tv_pix_per_frame as u64
                        / tv_freq as u64;

                    trace!("h_total={} v_total={} crt_freq={} drift={}", h_total, v_total, crt_freq, drift);

                    if drift <= bounds.max_drift as u64 {
                        let mut tweaked = *mode;
                        tweaked.horizontal.total = h_total as u32;
                        tweaked.vertical.total = v_total as u32;
                        tweaked.pixel_clock = crt_freq;
                        debug!("matched CRT to TV: {}x{} @ {} Hz, drift {}", h_total, v_total, crt_freq, drift);
                        return Ok((tweaked, dividers));
                    }
                }
            }
        }
    }

    warn!("no CRT timing within drift {}", bounds.max_drift);

    // nothing had dividers at all: report that rather than the drift
    match no_solution {
        Some(e) if !solved_any => Err(e),
        _ => Err(Error::ToleranceNotAchieved { max_drift: bounds.max_drift }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PIXEL_PLL;

    // NTSC encoder: 2730 x 525 clocks per frame at 12 x subcarrier
    const TV_PIX: u32 = 2730 * 525;
    const TV_FREQ: u32 = 42_954_545;

    fn vga() -> DisplayTiming {
        DisplayTiming {
            horizontal: Timings { display: 640, sync_start: 656, sync_end: 752, total: 800 },
            vertical: Timings { display: 480, sync_start: 490, sync_end: 492, total: 525 },
            pixel_clock: 25_175_000,
            h_sync: SyncPolarity::Negative,
            v_sync: SyncPolarity::Negative,
        }
    }

    #[test]
    fn unbounded_drift_keeps_mode() {
        let bounds = TweakBounds { max_v_tweak: 2, max_h_tweak: 40, max_drift: u32::MAX };
        let (t, d) = reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, None).unwrap();
        assert_eq!(t.horizontal.total, 800);
        assert_eq!(t.vertical.total, 525);
        assert_eq!(d.freq, d.frequency(&PIXEL_PLL));
    }

    #[test]
    fn reconcile_is_deterministic() {
        let bounds = TweakBounds { max_v_tweak: 2, max_h_tweak: 40, max_drift: 6 };
        let a = reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, None).unwrap();
        let b = reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tweaks_stay_within_bounds() {
        let bounds = TweakBounds { max_v_tweak: 2, max_h_tweak: 40, max_drift: 6 };
        let (t, _) = reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, None).unwrap();
        assert!(t.vertical.total.abs_diff(525) <= 2);
        assert!(t.horizontal.total.abs_diff(800) <= 40);
        // only the totals are touched
        assert_eq!(t.horizontal.sync_end, 752);
        assert_eq!(t.vertical.display, 480);
    }

    #[test]
    fn exhausted_search_is_reported() {
        let bounds = TweakBounds { max_v_tweak: 0, max_h_tweak: 0, max_drift: 0 };
        assert_eq!(
            reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, None),
            Err(Error::ToleranceNotAchieved { max_drift: 0 })
        );
    }

    #[test]
    fn impossible_post_divider_reports_no_solution() {
        let bounds = TweakBounds { max_v_tweak: 1, max_h_tweak: 1, max_drift: 6 };
        assert!(matches!(
            reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, Some(5)),
            Err(Error::NoSolution { .. })
        ));
    }

    #[test]
    fn reconcile_keeps_fixed_post_divider() {
        let bounds = TweakBounds { max_v_tweak: 2, max_h_tweak: 40, max_drift: 6 };
        let (t, d) = reconcile(&PIXEL_PLL, &vga(), TV_PIX, TV_FREQ, &bounds, Some(8)).unwrap();
        assert_eq!((t.horizontal.total, t.vertical.total), (803, 525));
        assert_eq!(d.post_div, 8);
        assert_eq!(d.post_code, 3);
        assert!(d.vco(&PIXEL_PLL) >= PIXEL_PLL.vco_min);
    }

    #[test]
    fn crtc_words() {
        let w = vga().crtc_words();
        assert_eq!(w[0], (0x0300, 639 << 16 | 799));
        assert_eq!(w[1], (0x0304, 1 << 23 | 96 << 16 | 656));
        assert_eq!(w[2], (0x0308, 479 << 16 | 524));
        assert_eq!(w[3], (0x030c, 1 << 23 | 2 << 16 | 490));
    }

    #[test]
    fn broken_timing_is_rejected() {
        let mut mode = vga();
        mode.horizontal.sync_start = 900;
        let bounds = TweakBounds { max_v_tweak: 0, max_h_tweak: 0, max_drift: u32::MAX };
        assert_eq!(
            reconcile(&PIXEL_PLL, &mode, TV_PIX, TV_FREQ, &bounds, None),
            Err(Error::InvalidTiming)
        );
    }
}
