//! TV encoder parameters
//!
//! The encoder scales the CRTC2 picture onto an interlaced TV raster. Given a
//! CRT mode and a TV standard this module finds matching CRT/TV PLL settings
//! (see [`crate::timing::reconcile`]) and derives the scaler increments, the
//! flicker filter and the point where the encoder restarts relative to the
//! CRTC, so both stay in phase.

use log::{debug, info, warn};

use crate::{
    config::TvOutConfig,
    constants::*,
    errors::*,
    pll::PllDividers,
    register::*,
    standard::{TvStandard, TvTiming},
    timing::{reconcile, DisplayTiming},
};


/// Flicker filter selection rule
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlickerPolicy {
    /// Internal encoder: removal may reach twice the integer chroma increment
    Internal,
    /// External encoder: removal stays strictly below twice the integer chroma increment
    External,
}

/// Flicker removal factor / saw tooth slope (10 fraction bits),
/// most aggressive first
const FLICKER_FIXER: [(u32, u32); 5] = [
    (6, 171),
    (5, 205),
    (4, 256),
    (3, 341),
    (2, 512),
];

/// Luma saw tooth flicker filter setup
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlickerFixer {
    pub removal: u32,
    /// 10 fraction bits
    pub slope: u32,
    pub amp: u32,
    pub y_fall_accum_init: u32,
    pub y_rise_accum_init: u32,
}

impl FlickerFixer {
    /// Picks the strongest filter the chroma increment `uv_inc`
    /// (10 fraction bits) allows and derives its saw tooth.
    /// `uv_accum_init` has 6 fraction bits.
    pub fn new(uv_inc: u32, uv_accum_init: u32, policy: FlickerPolicy) -> Self {
        let one = 1i64 << UV_INC_FRAC_BITS;
        let lo = (uv_inc + (1 << UV_INC_FRAC_BITS) - 1) >> UV_INC_FRAC_BITS;
        let hi = 2 * (uv_inc >> UV_INC_FRAC_BITS);

        let fits = |removal: u32| match policy {
            FlickerPolicy::Internal => lo <= removal && removal <= hi,
            FlickerPolicy::External => lo <= removal && removal < hi,
        };

        let last = FLICKER_FIXER[FLICKER_FIXER.len() - 1];
        let (removal, slope) = FLICKER_FIXER
            .iter()
            .copied()
            .find(|&(removal, _)| fits(removal))
            .unwrap_or(last);

        let slope_q = slope as i64;
        let acc = (uv_accum_init as i64) << (UV_INC_FRAC_BITS - ACCUM_FRAC_BITS);
        let amp = (uv_inc as i64 * slope_q) >> UV_INC_FRAC_BITS;
        let fall = (acc * slope_q) >> UV_INC_FRAC_BITS;

        let diff = ((removal as i64) << UV_INC_FRAC_BITS) - uv_inc as i64;
        let rise = if diff < acc {
            ((acc - diff) * slope_q) >> UV_INC_FRAC_BITS
        } else {
            (one - (((diff - acc) * slope_q) >> UV_INC_FRAC_BITS)).max(0)
        };

        FlickerFixer {
            removal,
            slope,
            amp: amp as u32,
            y_fall_accum_init: fall as u32,
            y_rise_accum_init: rise as u32,
        }
    }
}

/// Encoder restart position
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Restart {
    pub frame: u32,
    pub line: u32,
    pub pixel: u32,
}

/// Everything the encoder and CRTC2 need for one mode on one standard
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncoderParameters {
    /// CRT mode, detuned to the TV frame rate
    pub timing: DisplayTiming,
    pub crt_dividers: PllDividers,
    pub tv_dividers: PllDividers,
    /// Vertical chroma increment, 10 fraction bits
    pub uv_inc: u32,
    /// Horizontal increment, 12 fraction bits
    pub h_inc: u32,
    /// 6 fraction bits
    pub uv_accum_init: u32,
    pub y_accum_init: u32,
    pub flicker: FlickerFixer,
    pub restart: Restart,
}

/// Computes the encoder setup for `mode` on `standard`.
pub fn calculate(
    config: &TvOutConfig,
    standard: TvStandard,
    mode: &DisplayTiming,
) -> Result<EncoderParameters> {
    mode.validate()?;
    let tv = standard.timing();

    let tv_dividers = config.tv_pll.solve(tv.freq, None)?;
    let (timing, crt_dividers) = reconcile(
        &config.crt_pll,
        mode,
        tv.pix_per_frame(),
        tv_dividers.freq,
        &config.tweak,
        config.crt_fixed_post_div,
    )?;

    let uv_inc = (timing.vertical.total << UV_INC_FRAC_BITS) * 2 / tv.v_total;

    let h_inc = ((timing.horizontal.display as u64) << (TV_H_INC_FRAC_BITS + TV_SCALE_FRAC_BITS))
        / ((tv.h_active_len + tv.h_active_delay) as u64 * tv.scale as u64);

    let flicker = FlickerFixer::new(uv_inc, UV_ACCUM_INIT, config.flicker_policy);
    let restart = restart_position(tv, &timing, uv_inc, crt_dividers.freq, tv_dividers.freq)?;

    info!(
        "{:?}: CRT {}x{} @ {} Hz, uv_inc {}, h_inc {}, restart {:?}",
        standard, timing.horizontal.total, timing.vertical.total, crt_dividers.freq, uv_inc, h_inc, restart
    );
    debug!("flicker {:?}", flicker);

    Ok(EncoderParameters {
        timing,
        crt_dividers,
        tv_dividers,
        uv_inc,
        h_inc: h_inc as u32,
        uv_accum_init: UV_ACCUM_INIT,
        y_accum_init: Y_ACCUM_INIT,
        flicker,
        restart,
    })
}

/// CRT position at which the encoder gets restarted.
///
/// Runs the chroma accumulator over the CRT vertical blank until it has
/// covered the TV blank lines, then backs off the encoder startup delay.
/// Fails if the CRT blank ends first.
fn restart_position(
    tv: &TvTiming,
    timing: &DisplayTiming,
    uv_inc: u32,
    crt_freq: u32,
    tv_freq: u32,
) -> Result<Restart> {
    let h = timing.horizontal.total as i64;
    let v = timing.vertical.total as i64;
    let frame = h * v;
    let uv_inc = uv_inc as i64;
    let target = (tv.v_blank_lines() as i64) << UV_INC_FRAC_BITS;

    let mut accum = (UV_ACCUM_INIT as i64) << (UV_INC_FRAC_BITS - ACCUM_FRAC_BITS);
    let mut reached = None;
    for line in timing.vertical.display as i64 .. v {
        accum += uv_inc;
        if accum >= target {
            let overshoot = accum - target;
            reached = Some(line * h + h * (uv_inc - overshoot) / uv_inc);
            break;
        }
    }

    let mut pix = match reached {
        Some(pix) => pix,
        None => {
            warn!("chroma accumulator at {} of {} after the CRT vertical blank", accum, target);
            return Err(Error::ShortVerticalBlank);
        }
    };

    pix -= tv.startup_delay as i64 * crt_freq as i64 / tv_freq as i64;
    pix += frame;

    Ok(Restart {
        frame: (pix / frame).rem_euclid(tv.f_total as i64) as u32,
        line: (pix / h).rem_euclid(v) as u32,
        pixel: pix.rem_euclid(h) as u32,
    })
}

impl EncoderParameters {
    /// Stores these parameters into `regs`, leaving unrelated bits alone.
    pub fn merge(self: &Self, regs: TvOutRegisterSet) -> TvOutRegisterSet {
        regs.set(TvHInc(self.h_inc))
            .set(TvUvInc(self.uv_inc))
            .set(TvYAccumInit(self.y_accum_init))
            .set(TvUvAccumInit(self.uv_accum_init))
            .set(TvYFallAccumInit(self.flicker.y_fall_accum_init))
            .set(TvYRiseAccumInit(self.flicker.y_rise_accum_init))
            .set(TvYSawToothAmp(self.flicker.amp))
            .set(TvYSawToothSlope(self.flicker.slope))
            .set(TvHRestartPos(self.restart.pixel))
            .set(TvVRestartPos(self.restart.line))
            .set(TvFRestartPos(self.restart.frame))
    }
}
