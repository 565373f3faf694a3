//! PLL divider calculations
//!
//! The PLL gets the crystal reference divided down:
//!     pll_in = ref_freq / ref_div
//! which must stay within `pll_in_min ..= pll_in_max`.
//! The VCO then runs at
//!     vco = pll_in * feedback_div * extra_feedback_div
//! which must stay within `vco_min ..= vco_max`, and the output clock is
//!     f_out = vco / (post_div * extra_post_div)
//!           = ref_freq * feedback_div * extra_feedback_div / (ref_div * post_div * extra_post_div)
//!
//! Reference, VCO and PLL input frequencies are kept in 10 kHz units,
//! output frequencies in Hz.

use log::debug;

use crate::{constants::*, errors::*, fixed::round_div, register::*};


/// One selectable divider value and the code that selects it in hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PllDivider {
    pub divider: u32,
    pub code: u32,
}

/// Limits of a PLL.
#[derive(Debug, Copy, Clone)]
pub struct PllConstraints {
    /// Reference (crystal) frequency, 10 kHz
    pub ref_freq: u32,
    /// Post dividers, in search order
    pub post_divs: &'static [PllDivider],
    /// Extra post dividers, in search order
    pub extra_post_divs: &'static [PllDivider],
    /// VCO range, 10 kHz
    pub vco_min: u32,
    pub vco_max: u32,
    pub min_ref_div: u32,
    pub max_ref_div: u32,
    /// PLL input range, 10 kHz
    pub pll_in_min: u32,
    pub pll_in_max: u32,
    /// Hard-wired feedback divider
    pub extra_feedback_div: u32,
    pub min_feedback_div: u32,
    pub max_feedback_div: u32,
    /// Preferred VCO frequency, 10 kHz; 0 means no preference
    pub best_vco: u32,
}

/// Divider setting found by [`PllConstraints::solve`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PllDividers {
    pub post_code: u32,
    pub extra_post_code: u32,
    pub ref_div: u32,
    pub feedback_div: u32,
    pub post_div: u32,
    pub extra_post_div: u32,
    /// Frequency actually produced by these dividers, Hz
    pub freq: u32,
}

#[derive(Debug, Copy, Clone)]
struct Candidate {
    dividers: PllDividers,
    error: u32,
    vco_diff: u32,
}

impl PllConstraints {

    /// Finds the divider combination closest to `target_hz`.
    ///
    /// `fixed_post_div` restricts the search to one post divider value.
    /// With a preferred VCO configured a later candidate only replaces the
    /// current best if it is more than [`PLL_HYSTERESIS_HZ`] closer, or
    /// equally close (within the hysteresis) but nearer the preferred VCO.
    pub fn solve(self: &Self, target_hz: u32, fixed_post_div: Option<u32>) -> Result<PllDividers> {
        let mut best: Option<Candidate> = None;

        for extra_post in self.extra_post_divs {
            for post in self.post_divs {
                if fixed_post_div.map_or(false, |fixed| fixed != post.divider) {
                    continue;
                }

                // reduced precision, keeps the product in range
                let vco = (target_hz / PLL_FREQ_UNIT_HZ) as u64
                    * post.divider as u64
                    * extra_post.divider as u64;
                if vco < self.vco_min as u64 || vco > self.vco_max as u64 {
                    continue;
                }
                let vco = vco as u32;

                for ref_div in self.min_ref_div ..= self.max_ref_div {
                    let pll_in = self.ref_freq / ref_div;
                    if pll_in < self.pll_in_min || pll_in > self.pll_in_max {
                        continue;
                    }

                    let feedback_div = round_div(
                        target_hz as u64 * ref_div as u64 * post.divider as u64 * extra_post.divider as u64,
                        self.ref_freq as u64 * PLL_FREQ_UNIT_HZ as u64 * self.extra_feedback_div as u64,
                    );
                    if feedback_div < self.min_feedback_div as u64 || feedback_div > self.max_feedback_div as u64 {
                        continue;
                    }

                    let mut dividers = PllDividers {
                        post_code: post.code,
                        extra_post_code: extra_post.code,
                        ref_div,
                        feedback_div: feedback_div as u32,
                        post_div: post.divider,
                        extra_post_div: extra_post.divider,
                        freq: 0,
                    };
                    dividers.freq = dividers.frequency(self);

                    let candidate = Candidate {
                        dividers,
                        error: dividers.freq.abs_diff(target_hz),
                        vco_diff: vco.abs_diff(self.best_vco),
                    };

                    if self.improves(&candidate, best.as_ref()) {
                        best = Some(candidate);
                    }
                }
            }
        }

        match best {
            Some(c) => {
                debug!("PLL {} Hz -> {:?} (error {} Hz)", target_hz, c.dividers, c.error);
                Ok(c.dividers)
            }
            None => Err(Error::NoSolution { target_hz }),
        }
    }

    fn improves(self: &Self, candidate: &Candidate, best: Option<&Candidate>) -> bool {
        let best = match best {
            Some(b) => b,
            None => return true,
        };

        if self.best_vco == 0 {
            candidate.error < best.error
        } else {
            candidate.error + PLL_HYSTERESIS_HZ < best.error
                || (candidate.error.abs_diff(best.error) < PLL_HYSTERESIS_HZ
                    && candidate.vco_diff < best.vco_diff)
        }
    }
}

impl PllDividers {

    /// Output frequency of these dividers, Hz
    /// f_out = ref_freq * feedback_div * extra_feedback_div / (ref_div * post_div * extra_post_div)
    pub fn frequency(self: &Self, pll: &PllConstraints) -> u32 {
        round_div(
            pll.ref_freq as u64
                * PLL_FREQ_UNIT_HZ as u64
                * self.feedback_div as u64
                * pll.extra_feedback_div as u64,
            self.ref_div as u64 * self.post_div as u64 * self.extra_post_div as u64,
        ) as u32
    }

    /// VCO frequency, 10 kHz
    pub fn vco(self: &Self, pll: &PllConstraints) -> u32 {
        (pll.ref_freq as u64 * self.feedback_div as u64 * pll.extra_feedback_div as u64
            / self.ref_div as u64) as u32
    }

    /// Reference divider update for PLL register `R`
    pub fn ref_div_word<R>(self: &Self) -> MaskedWrite
    where R: Register,
          PllRefDiv: BitField<R>,
    {
        Reg::<R>::default()
            .set(PllRefDiv(self.ref_div))
            .write_masked(Reg::<R>::field_mask::<PllRefDiv>())
    }

    /// Feedback / post divider update for PLL register `R`
    pub fn div_word<R>(self: &Self) -> MaskedWrite
    where R: Register,
          PllFeedbackDiv: BitField<R>,
          PllPostCode: BitField<R>,
          PllExtraPostCode: BitField<R>,
    {
        let mask = Reg::<R>::field_mask::<PllFeedbackDiv>()
            | Reg::<R>::field_mask::<PllPostCode>()
            | Reg::<R>::field_mask::<PllExtraPostCode>();
        Reg::<R>::default()
            .set(PllFeedbackDiv(self.feedback_div))
            .set(PllPostCode(self.post_code))
            .set(PllExtraPostCode(self.extra_post_code))
            .write_masked(mask)
    }
}
