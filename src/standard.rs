//! Broadcast TV standards
//!
//! The encoder clock of every standard is 12x its colour subcarrier, so the
//! colour burst stays locked to the pixel grid.

/// Supported TV standards
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TvStandard {
    Ntsc,
    NtscJapan,
    PalBdghi,
    PalM,
    PalN,
    PalNc,
}

/// Encoder timing of one standard, in encoder clocks and lines
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TvTiming {
    /// Encoder clock, Hz
    pub freq: u32,
    /// Clocks per line
    pub h_total: u32,
    /// Clocks of active video per line
    pub h_active_len: u32,
    /// Clocks from line start to active video
    pub h_active_delay: u32,
    /// Lines per interlaced frame (both fields)
    pub v_total: u32,
    /// Active lines per frame
    pub v_active_lines: u32,
    /// Frames until the colour sequence repeats
    pub f_total: u32,
    /// Clocks per frame minus `h_total * v_total`
    pub frame_size_adjust: i32,
    /// Non-square pixel aspect, 16.16
    pub scale: u32,
    /// Clocks between encoder restart and its line counter running
    pub startup_delay: u32,
}

impl TvTiming {
    /// Encoder clocks per frame
    pub fn pix_per_frame(self: &Self) -> u32 {
        (self.h_total as i64 * self.v_total as i64 + self.frame_size_adjust as i64) as u32
    }

    /// Blank lines per field
    pub fn v_blank_lines(self: &Self) -> u32 {
        (self.v_total - self.v_active_lines) / 2
    }
}

const NTSC: TvTiming = TvTiming {
    freq: 42_954_545,
    h_total: 2730,
    h_active_len: 2259,
    h_active_delay: 404,
    v_total: 525,
    v_active_lines: 480,
    f_total: 2,
    frame_size_adjust: 0,
    scale: 59578, // 10/11
    startup_delay: 1000,
};

const PAL: TvTiming = TvTiming {
    freq: 53_203_425,
    h_total: 3405,
    h_active_len: 2767,
    h_active_delay: 559,
    v_total: 625,
    v_active_lines: 576,
    f_total: 4,
    frame_size_adjust: 12,
    scale: 71604, // 59/54
    startup_delay: 1240,
};

const TV_TIMINGS: [TvTiming; 6] = [
    NTSC,
    // NTSC-J only differs in black level
    NTSC,
    PAL,
    // PAL-M
    TvTiming {
        freq: 42_907_338,
        h_total: 2727,
        h_active_len: 2257,
        h_active_delay: 403,
        f_total: 4,
        ..NTSC
    },
    PAL,
    // PAL-Nc
    TvTiming {
        freq: 42_984_675,
        h_total: 2751,
        h_active_len: 2235,
        h_active_delay: 451,
        startup_delay: 1000,
        ..PAL
    },
];

impl TvStandard {
    pub fn timing(self) -> &'static TvTiming {
        &TV_TIMINGS[self as usize]
    }
}
