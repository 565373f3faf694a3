//! Adapter registers
//!
//! Only the fields computed by this crate are named; every other bit of a
//! register is carried through untouched, so register sets are meant to be
//! read from the adapter, updated and written back.
//!
//! PLL registers live in the indirect PLL index space. Their addresses
//! carry [`PLL_SPACE`]; the register access implementation routes them
//! through the clock index/data pair.

use core::marker::PhantomData;

/// Marks addresses in the PLL index space
pub const PLL_SPACE: u32 = 0x8000_0000;

/// Register with a fixed address
pub trait Register {
    const ADDR: u32;
}

/// Register marker types
macro_rules! gen_register_marker {
    ($(#[$meta:meta])* $r:ident, $addr:expr) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $r {}

        impl Register for $r { const ADDR: u32 = $addr; }
    }
}

gen_register_marker!(
    /// CRTC2 horizontal total / display end
    Crtc2HTotalDisp, 0x0300);
gen_register_marker!(
    /// CRTC2 horizontal sync start / width
    Crtc2HSyncStrtWid, 0x0304);
gen_register_marker!(
    /// CRTC2 vertical total / display end
    Crtc2VTotalDisp, 0x0308);
gen_register_marker!(
    /// CRTC2 vertical sync start / width
    Crtc2VSyncStrtWid, 0x030c);

gen_register_marker!(
    /// Pixel PLL 2 reference divider
    P2pllRefDiv, PLL_SPACE | 0x2c);
gen_register_marker!(
    /// Pixel PLL 2 feedback / post divider
    P2pllDiv0, PLL_SPACE | 0x2a);
gen_register_marker!(
    /// TV PLL reference divider
    TvPllRefDiv, PLL_SPACE | 0x20);
gen_register_marker!(
    /// TV PLL feedback / post divider
    TvPllCntl, PLL_SPACE | 0x21);

gen_register_marker!(TvTimingCntl, 0x0d04);
gen_register_marker!(TvVScalerCntl1, 0x0d0c);
gen_register_marker!(TvVScalerCntl2, 0x0d10);
gen_register_marker!(TvYFallCntl, 0x0d1c);
gen_register_marker!(TvYRiseCntl, 0x0d20);
gen_register_marker!(TvYSawToothCntl, 0x0d24);
gen_register_marker!(TvHRestart, 0x0d50);
gen_register_marker!(TvVRestart, 0x0d54);
gen_register_marker!(TvFRestart, 0x0d58);

gen_register_marker!(Ov0YXStart, 0x0400);
gen_register_marker!(Ov0YXEnd, 0x0404);
gen_register_marker!(
    /// Overlay register update lock
    Ov0RegLoadCntl, 0x0410);
gen_register_marker!(Ov0ScaleCntl, 0x0420);
gen_register_marker!(Ov0VInc, 0x0424);
gen_register_marker!(Ov0P1VAccumInit, 0x0428);
gen_register_marker!(Ov0P23VAccumInit, 0x042c);
gen_register_marker!(Ov0P1BlankLinesAtTop, 0x0430);
gen_register_marker!(Ov0P23BlankLinesAtTop, 0x0434);
gen_register_marker!(Ov0VidBuf0BaseAdrs, 0x0440);
gen_register_marker!(Ov0VidBuf1BaseAdrs, 0x0444);
gen_register_marker!(Ov0VidBuf2BaseAdrs, 0x0448);
gen_register_marker!(Ov0VidBufPitch0Value, 0x0460);
gen_register_marker!(Ov0VidBufPitch1Value, 0x0464);
gen_register_marker!(Ov0HInc, 0x0480);
gen_register_marker!(Ov0StepBy, 0x0484);
gen_register_marker!(Ov0P1HAccumInit, 0x0488);
gen_register_marker!(Ov0P23HAccumInit, 0x048c);
gen_register_marker!(Ov0P1XStartEnd, 0x0494);
gen_register_marker!(Ov0P2XStartEnd, 0x0498);
gen_register_marker!(Ov0P3XStartEnd, 0x049c);


/// Single 32-bit register
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Reg<R> {
    /// Register word
    pub w: u32,
    phantom: PhantomData<R>,
}

impl<R> Default for Reg<R> {
    #[inline]
    fn default() -> Self { Reg::new(0) }
}

/// Bit operations on 32bit words
impl<R> Reg<R> {
    #[inline]
    pub fn new(w: u32) -> Self {
        Reg { w, phantom: PhantomData }
    }

    #[inline]
    pub fn get<F>(self: &Self) -> F
    where F: BitField<R> + From<u32>
    {
        F::from(
            (self.w >> F::offset()) & F::mask()
        )
    }

    #[inline]
    pub fn set<F>(mut self, f: F) -> Self
    where F: BitField<R> + Into<u32>
    {
        let fbits = (f.into() & F::mask()) << F::offset();
        let rbits = self.w & !(F::mask() << F::offset());
        self.w = rbits | fbits;
        self
    }
}

impl<R: Register> Reg<R> {
    /// `(address, value)` pair ready to be written
    #[inline]
    pub fn write(self: &Self) -> (u32, u32) {
        (R::ADDR, self.w)
    }

    /// Write mask covering the field `F`
    #[inline]
    pub fn field_mask<F: BitField<R>>() -> u32 {
        F::mask() << F::offset()
    }

    /// Read-modify-write of the bits in `mask` only
    #[inline]
    pub fn write_masked(self: &Self, mask: u32) -> MaskedWrite {
        MaskedWrite { addr: R::ADDR, value: self.w & mask, mask }
    }
}

/// Register update that leaves bits outside `mask` alone
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct MaskedWrite {
    pub addr: u32,
    pub value: u32,
    pub mask: u32,
}


/// Bit operations on 32bit words
pub trait BitField<R> {
    /// Number of bits in the bit field
    fn num_bits() -> u8;

    /// Offset from 0
    fn offset() -> u8;

    #[inline]
    fn mask() -> u32 {
        if Self::num_bits() >= 32 {
            0xFFFF_FFFF
        } else {
            !(0xFFFF_FFFFu32 << Self::num_bits())
        }
    }
}

/// Generate BitField implementation
macro_rules! gen_bitfield_impl {
    ($r:ty, $n:ident, $nb:tt, $off:tt) => {
        impl BitField<$r> for $n {
            #[inline] fn num_bits() -> u8 { $nb }
            #[inline] fn offset() -> u8 { $off }
        }
    }
}

/// Numeric bitfield, possibly shared by several registers of the same layout
macro_rules! gen_bitfield_struct {
    ($(#[$meta:meta])* [$($r:ty),+], $n:ident, $nb:tt, $off:tt) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $n(pub u32);

        $( gen_bitfield_impl!($r, $n, $nb, $off); )+

        impl From<u32> for $n { #[inline] fn from(x: u32) -> Self { $n(x) } }
        impl From<$n> for u32 { #[inline] fn from(f: $n) -> u32 { f.0 } }
    };
}

/// Single bit flag
macro_rules! gen_bitfield_flag {
    ($(#[$meta:meta])* [$($r:ty),+], $n:ident, $off:tt) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $n(pub bool);

        $( gen_bitfield_impl!($r, $n, 1, $off); )+

        impl From<u32> for $n { #[inline] fn from(x: u32) -> Self { $n(x != 0) } }
        impl From<$n> for u32 { #[inline] fn from(f: $n) -> u32 { f.0 as u32 } }
    };
}


// CRTC

gen_bitfield_struct!(
    /// Total pixels (lines) minus one
    [Crtc2HTotalDisp, Crtc2VTotalDisp], CrtcTotal, 12, 0);
gen_bitfield_struct!(
    /// Displayed pixels (lines) minus one
    [Crtc2HTotalDisp, Crtc2VTotalDisp], CrtcDisplay, 12, 16);
gen_bitfield_struct!(
    /// Sync start, pixels (lines)
    [Crtc2HSyncStrtWid, Crtc2VSyncStrtWid], CrtcSyncStart, 12, 0);
gen_bitfield_struct!(
    /// Sync width, pixels (lines)
    [Crtc2HSyncStrtWid, Crtc2VSyncStrtWid], CrtcSyncWidth, 8, 16);
gen_bitfield_flag!(
    /// Active low sync
    [Crtc2HSyncStrtWid, Crtc2VSyncStrtWid], CrtcSyncNegative, 23);


// PLLs

gen_bitfield_struct!([P2pllRefDiv, TvPllRefDiv], PllRefDiv, 10, 0);
gen_bitfield_struct!([P2pllDiv0, TvPllCntl], PllFeedbackDiv, 11, 0);
gen_bitfield_struct!([P2pllDiv0, TvPllCntl], PllPostCode, 3, 16);
gen_bitfield_struct!([P2pllDiv0, TvPllCntl], PllExtraPostCode, 1, 19);


// TV encoder

gen_bitfield_struct!(
    /// Horizontal source increment, 12 fraction bits
    [TvTimingCntl], TvHInc, 12, 0);
gen_bitfield_struct!(
    /// Vertical chroma increment, 10 fraction bits
    [TvVScalerCntl1], TvUvInc, 14, 0);
gen_bitfield_struct!([TvVScalerCntl2], TvYAccumInit, 8, 16);
gen_bitfield_struct!([TvVScalerCntl2], TvUvAccumInit, 8, 24);
gen_bitfield_struct!([TvYFallCntl], TvYFallAccumInit, 16, 0);
gen_bitfield_struct!([TvYRiseCntl], TvYRiseAccumInit, 16, 0);
gen_bitfield_struct!([TvYSawToothCntl], TvYSawToothAmp, 16, 0);
gen_bitfield_struct!([TvYSawToothCntl], TvYSawToothSlope, 16, 16);
gen_bitfield_struct!([TvHRestart], TvHRestartPos, 12, 0);
gen_bitfield_struct!([TvVRestart], TvVRestartPos, 11, 0);
gen_bitfield_struct!([TvFRestart], TvFRestartPos, 10, 0);


// Overlay

gen_bitfield_struct!([Ov0YXStart, Ov0YXEnd], ScreenX, 12, 0);
gen_bitfield_struct!([Ov0YXStart, Ov0YXEnd], ScreenY, 12, 16);
gen_bitfield_flag!(
    /// Registers written while set are applied together once it is cleared
    [Ov0RegLoadCntl], UpdateLock, 0);
gen_bitfield_flag!(
    /// Set by hardware once the lock is effective
    [Ov0RegLoadCntl], UpdateLockReadback, 3);
gen_bitfield_struct!([Ov0ScaleCntl], SourceFormat, 4, 8);
gen_bitfield_flag!([Ov0ScaleCntl], VerticalTwoTap, 20);
gen_bitfield_flag!([Ov0ScaleCntl], ScalerEnable, 30);
gen_bitfield_struct!(
    /// Vertical increment, 12.20
    [Ov0VInc], VInc, 24, 0);
gen_bitfield_struct!(
    /// Accumulator start, 4.12
    [Ov0P1VAccumInit, Ov0P23VAccumInit, Ov0P1HAccumInit, Ov0P23HAccumInit], AccumInit, 16, 0);
gen_bitfield_struct!([Ov0P1BlankLinesAtTop, Ov0P23BlankLinesAtTop], ActiveLines, 12, 16);
gen_bitfield_struct!(
    [Ov0VidBuf0BaseAdrs, Ov0VidBuf1BaseAdrs, Ov0VidBuf2BaseAdrs], BufferOffset, 32, 0);
gen_bitfield_struct!([Ov0VidBufPitch0Value, Ov0VidBufPitch1Value], Pitch, 14, 0);
gen_bitfield_struct!(
    /// Luma increment, 4.12
    [Ov0HInc], P1HInc, 14, 0);
gen_bitfield_struct!(
    /// Chroma increment, 4.12
    [Ov0HInc], P23HInc, 14, 16);
gen_bitfield_struct!([Ov0StepBy], P1StepBy, 3, 0);
gen_bitfield_struct!([Ov0StepBy], P23StepBy, 3, 8);
gen_bitfield_struct!([Ov0P1XStartEnd, Ov0P2XStartEnd, Ov0P3XStartEnd], XEnd, 12, 0);
gen_bitfield_struct!([Ov0P1XStartEnd, Ov0P2XStartEnd, Ov0P3XStartEnd], XStart, 12, 16);


/// TV encoder registers holding values derived from the mode.
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct TvOutRegisterSet {
    pub timing_cntl: Reg<TvTimingCntl>,
    pub vscaler_cntl1: Reg<TvVScalerCntl1>,
    pub vscaler_cntl2: Reg<TvVScalerCntl2>,
    pub y_fall_cntl: Reg<TvYFallCntl>,
    pub y_rise_cntl: Reg<TvYRiseCntl>,
    pub y_saw_tooth_cntl: Reg<TvYSawToothCntl>,
    pub h_restart: Reg<TvHRestart>,
    pub v_restart: Reg<TvVRestart>,
    pub f_restart: Reg<TvFRestart>,
}

/// Type-indexed register access
pub trait RIdx<R> {
    fn r(self: &Self) -> Reg<R>;
    fn update_r<F>(self, f: F) -> Self where F: FnOnce(Reg<R>) -> Reg<R>;
}

macro_rules! gen_register_index {
    ($set:ty, $r:ident, $f:tt) => {
        impl RIdx<$r> for $set {
            #[inline]
            fn r(self: &Self) -> Reg<$r> { self.$f }
            #[inline]
            fn update_r<F>(mut self, f: F) -> Self where F: FnOnce(Reg<$r>) -> Reg<$r> {
                self.$f = f(self.$f);
                self
            }
        }
    }
}

gen_register_index!(TvOutRegisterSet, TvTimingCntl, timing_cntl);
gen_register_index!(TvOutRegisterSet, TvVScalerCntl1, vscaler_cntl1);
gen_register_index!(TvOutRegisterSet, TvVScalerCntl2, vscaler_cntl2);
gen_register_index!(TvOutRegisterSet, TvYFallCntl, y_fall_cntl);
gen_register_index!(TvOutRegisterSet, TvYRiseCntl, y_rise_cntl);
gen_register_index!(TvOutRegisterSet, TvYSawToothCntl, y_saw_tooth_cntl);
gen_register_index!(TvOutRegisterSet, TvHRestart, h_restart);
gen_register_index!(TvOutRegisterSet, TvVRestart, v_restart);
gen_register_index!(TvOutRegisterSet, TvFRestart, f_restart);

impl TvOutRegisterSet {
    /// Register addresses, in `to_words` order
    pub const ADDRS: [u32; 9] = [
        TvTimingCntl::ADDR,
        TvVScalerCntl1::ADDR,
        TvVScalerCntl2::ADDR,
        TvYFallCntl::ADDR,
        TvYRiseCntl::ADDR,
        TvYSawToothCntl::ADDR,
        TvHRestart::ADDR,
        TvVRestart::ADDR,
        TvFRestart::ADDR,
    ];

    pub fn from_words(w: [u32; 9]) -> Self {
        TvOutRegisterSet {
            timing_cntl: Reg::new(w[0]),
            vscaler_cntl1: Reg::new(w[1]),
            vscaler_cntl2: Reg::new(w[2]),
            y_fall_cntl: Reg::new(w[3]),
            y_rise_cntl: Reg::new(w[4]),
            y_saw_tooth_cntl: Reg::new(w[5]),
            h_restart: Reg::new(w[6]),
            v_restart: Reg::new(w[7]),
            f_restart: Reg::new(w[8]),
        }
    }

    /// Register values in device format.
    pub fn to_words(self: &Self) -> [u32; 9] {
        [
            self.timing_cntl.w,
            self.vscaler_cntl1.w,
            self.vscaler_cntl2.w,
            self.y_fall_cntl.w,
            self.y_rise_cntl.w,
            self.y_saw_tooth_cntl.w,
            self.h_restart.w,
            self.v_restart.w,
            self.f_restart.w,
        ]
    }

    /// Get register bitfield value
    #[inline]
    pub fn get<F,R>(self: &Self) -> F
    where F: BitField<R> + From<u32>,
          Self: RIdx<R>
    {
        RIdx::<R>::r(self).get()
    }

    /// Update register bitfield
    #[inline]
    pub fn set<F,R>(self, f: F) -> Self
    where F: BitField<R> + Into<u32>,
          Self: RIdx<R>
    {
        RIdx::<R>::update_r(self, |r| r.set(f))
    }
}
