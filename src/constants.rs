//! Constants

use crate::pll::{PllConstraints, PllDivider};

/// PLL reference, VCO and input frequencies are given in this unit
pub const PLL_FREQ_UNIT_HZ: u32 = 10_000;

/// Once a VCO preference is set, a new divider candidate must beat
/// the current one by more than this to replace it
pub const PLL_HYSTERESIS_HZ: u32 = 100;

/// Radeon crystal, 27 MHz
pub const REF_FREQ: u32 = 2700;

/// Pixel PLL post dividers; the code is the PPLL_POST3_DIV value
pub const PIXEL_PLL_POST_DIVS: [PllDivider; 8] = [
    PllDivider { divider: 1, code: 0 },
    PllDivider { divider: 2, code: 1 },
    PllDivider { divider: 4, code: 2 },
    PllDivider { divider: 8, code: 3 },
    PllDivider { divider: 3, code: 4 },
    PllDivider { divider: 16, code: 5 },
    PllDivider { divider: 6, code: 6 },
    PllDivider { divider: 12, code: 7 },
];

/// The pixel PLL has no extra post divider
pub const PIXEL_PLL_EXTRA_POST_DIVS: [PllDivider; 1] = [
    PllDivider { divider: 1, code: 0 },
];

/// Pixel (CRTC2) PLL
pub const PIXEL_PLL: PllConstraints = PllConstraints {
    ref_freq: REF_FREQ,
    post_divs: &PIXEL_PLL_POST_DIVS,
    extra_post_divs: &PIXEL_PLL_EXTRA_POST_DIVS,
    vco_min: 12500,
    vco_max: 35000,
    min_ref_div: 2,
    max_ref_div: 0x3ff,
    pll_in_min: 40,
    pll_in_max: 500,
    extra_feedback_div: 1,
    min_feedback_div: 4,
    max_feedback_div: 0x7ff,
    best_vco: 0,
};

/// TV PLL post dividers
pub const TV_PLL_POST_DIVS: [PllDivider; 4] = [
    PllDivider { divider: 1, code: 0 },
    PllDivider { divider: 2, code: 1 },
    PllDivider { divider: 4, code: 2 },
    PllDivider { divider: 8, code: 3 },
];

/// TV PLL output stage can divide by two once more
pub const TV_PLL_EXTRA_POST_DIVS: [PllDivider; 2] = [
    PllDivider { divider: 1, code: 0 },
    PllDivider { divider: 2, code: 1 },
];

/// TV encoder PLL.
/// The encoder prefers a VCO around 210 MHz.
pub const TV_PLL: PllConstraints = PllConstraints {
    ref_freq: REF_FREQ,
    post_divs: &TV_PLL_POST_DIVS,
    extra_post_divs: &TV_PLL_EXTRA_POST_DIVS,
    vco_min: 12000,
    vco_max: 40000,
    min_ref_div: 2,
    max_ref_div: 0x3ff,
    pll_in_min: 40,
    pll_in_max: 500,
    extra_feedback_div: 1,
    min_feedback_div: 4,
    max_feedback_div: 0x7ff,
    best_vco: 21000,
};

/// Default CRT tweak bounds for frame matching: lines, pixels, drift
pub const MAX_V_TWEAK: u32 = 2;
pub const MAX_H_TWEAK: u32 = 40;
pub const MAX_FRAME_RATE_DRIFT: u32 = 6;

/// Fraction bits of the TV vertical chroma increment
pub const UV_INC_FRAC_BITS: u32 = 10;

/// Fraction bits of the TV accumulator init registers
pub const ACCUM_FRAC_BITS: u32 = 6;

/// 0.25 with 6 fraction bits
pub const UV_ACCUM_INIT: u32 = 0x10;

pub const Y_ACCUM_INIT: u32 = 0;

/// Fraction bits of the TV horizontal increment
pub const TV_H_INC_FRAC_BITS: u32 = 12;

/// Fraction bits of the TV standards' pixel aspect scale
pub const TV_SCALE_FRAC_BITS: u32 = 16;

/// Fraction bits of overlay horizontal increments and accumulators (4.12)
pub const OV_H_INC_FRAC_BITS: u32 = 12;

/// Fraction bits of the overlay vertical increment (12.20)
pub const OV_V_INC_FRAC_BITS: u32 = 20;

/// Overlay line buffer word, bytes
pub const OV_LINE_BUFFER_WORD: u32 = 16;

/// Register update lock polling: iterations, delay per iteration (us)
pub const LOCK_POLL_ITERATIONS: u32 = 1000;
pub const LOCK_POLL_DELAY_US: u16 = 10;
