///! Driver configuration
///! PLL limits / frame matching bounds / overlay hardware

use crate::{ constants::*, pll::PllConstraints, timing::TweakBounds, tv::FlickerPolicy };


/// TV-out configuration
#[derive(Debug,Copy,Clone)]
pub struct TvOutConfig {
    /// PLL driving the CRTC that feeds the encoder
    pub crt_pll: PllConstraints,
    /// Encoder PLL
    pub tv_pll: PllConstraints,
    /// How far the CRT mode may be detuned
    pub tweak: TweakBounds,
    /// Post divider the CRT PLL must use, if any
    pub crt_fixed_post_div: Option<u32>,
    pub flicker_policy: FlickerPolicy,
}

impl Default for TvOutConfig {
    fn default() -> Self {
        TvOutConfig {
            crt_pll: PIXEL_PLL,
            tv_pll: TV_PLL,
            tweak: TweakBounds {
                max_v_tweak: MAX_V_TWEAK,
                max_h_tweak: MAX_H_TWEAK,
                max_drift: MAX_FRAME_RATE_DRIFT,
            },
            crt_fixed_post_div: None,
            flicker_policy: FlickerPolicy::Internal,
        }
    }
}

impl TvOutConfig {
    pub fn with_crt_pll(mut self, pll: PllConstraints) -> Self {
        self.crt_pll = pll;
        self
    }

    pub fn with_tv_pll(mut self, pll: PllConstraints) -> Self {
        self.tv_pll = pll;
        self
    }

    pub fn with_tweak_bounds(mut self, tweak: TweakBounds) -> Self {
        self.tweak = tweak;
        self
    }

    pub fn with_crt_fixed_post_div(mut self, post_div: Option<u32>) -> Self {
        self.crt_fixed_post_div = post_div;
        self
    }

    pub fn with_flicker_policy(mut self, policy: FlickerPolicy) -> Self {
        self.flicker_policy = policy;
        self
    }
}


/// Overlay engine generation
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum OverlayRevision {
    /// R100 / RV100 / RV200
    R100,
    /// R200 and later, larger line buffer
    R200,
}

impl OverlayRevision {
    /// Overlay line buffer, in 16 byte words
    pub fn line_buffer_words(self) -> u32 {
        match self {
            OverlayRevision::R100 => 1536 / OV_LINE_BUFFER_WORD,
            OverlayRevision::R200 => 2048 / OV_LINE_BUFFER_WORD,
        }
    }
}

/// Overlay configuration
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct OverlayConfig {
    pub revision: OverlayRevision,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig { revision: OverlayRevision::R100 }
    }
}

impl OverlayConfig {
    pub fn with_revision(mut self, revision: OverlayRevision) -> Self {
        self.revision = revision;
        self
    }
}
