///! Adapter access

use embedded_hal::blocking::delay::DelayUs;
use log::{debug, warn};

use crate::constants::*;
use crate::errors::*;
use crate::overlay::{buffer_registers, RegisterDelta};
use crate::pll::PllDividers;
use crate::register::*;
use crate::timing::DisplayTiming;
use crate::tv::EncoderParameters;


/// Memory mapped adapter registers.
///
/// Addresses carrying [`PLL_SPACE`] are PLL registers and have to go
/// through the clock index/data pair.
pub trait RegisterAccess {
    fn read(self: &mut Self, addr: u32) -> u32;

    fn write(self: &mut Self, addr: u32, value: u32);

    /// Replaces the bits in `mask` with those of `value`
    fn read_modify_write(self: &mut Self, addr: u32, value: u32, mask: u32) {
        let old = self.read(addr);
        self.write(addr, (old & !mask) | (value & mask));
    }
}

/// TV encoder timing table FIFO, with its own handshake
pub trait TimingFifo {
    type Error;

    fn write_fifo(self: &mut Self, addr: u32, value: u32) -> core::result::Result<(), Self::Error>;
}

/// Display adapter.
///
/// Multi-register updates take `&mut self`, so they can't interleave.
pub struct Adapter<R> {
    regs: R,
}


impl<R> Adapter<R>
where R: RegisterAccess,
{
    pub fn new(regs: R) -> Self {
        Adapter { regs }
    }

    /// Gives the register target back
    pub fn release(self) -> R {
        self.regs
    }

    #[inline]
    fn write_masked(self: &mut Self, m: MaskedWrite) {
        self.regs.read_modify_write(m.addr, m.value, m.mask);
    }

    fn write_all(self: &mut Self, words: &[(u32, u32)]) {
        for &(addr, value) in words {
            self.regs.write(addr, value);
        }
    }

    /// Programs the CRTC2 pixel PLL dividers.
    pub fn set_pixel_pll(self: &mut Self, d: &PllDividers) {
        self.write_masked(d.ref_div_word::<P2pllRefDiv>());
        self.write_masked(d.div_word::<P2pllDiv0>());
    }

    /// Programs the TV encoder PLL dividers.
    pub fn set_tv_pll(self: &mut Self, d: &PllDividers) {
        self.write_masked(d.ref_div_word::<TvPllRefDiv>());
        self.write_masked(d.div_word::<TvPllCntl>());
    }

    pub fn set_crtc2_timing(self: &mut Self, timing: &DisplayTiming) {
        self.write_all(&timing.crtc_words());
    }

    /// Reads the TV-out register set back from the adapter.
    pub fn read_tv_out(self: &mut Self) -> TvOutRegisterSet {
        let mut words = [0u32; 9];
        for (w, &addr) in words.iter_mut().zip(TvOutRegisterSet::ADDRS.iter()) {
            *w = self.regs.read(addr);
        }
        TvOutRegisterSet::from_words(words)
    }

    /// Writes encoder parameters, both PLLs and the detuned CRTC2 timing.
    pub fn program_tv_encoder(self: &mut Self, params: &EncoderParameters) {
        let rs = params.merge(self.read_tv_out());
        for (&addr, &w) in TvOutRegisterSet::ADDRS.iter().zip(rs.to_words().iter()) {
            self.regs.write(addr, w);
        }

        self.set_tv_pll(&params.tv_dividers);
        self.set_pixel_pll(&params.crt_dividers);
        self.set_crtc2_timing(&params.timing);
        debug!("TV encoder programmed");
    }

    /// Checks whether the overlay update lock has taken effect.
    pub fn poll_update_lock(self: &mut Self) -> nb::Result<(), Error> {
        let r = Reg::<Ov0RegLoadCntl>::new(self.regs.read(Ov0RegLoadCntl::ADDR));
        let ack: UpdateLockReadback = r.get();
        if ack.0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn set_update_lock(self: &mut Self, lock: bool) {
        let m = Reg::<Ov0RegLoadCntl>::default()
            .set(UpdateLock(lock))
            .write_masked(Reg::<Ov0RegLoadCntl>::field_mask::<UpdateLock>());
        self.write_masked(m);
    }

    /// Locks overlay register updates, waits for the hardware to confirm.
    /// Blocking call, gives up after [`LOCK_POLL_ITERATIONS`].
    fn lock_updates<Delay>(self: &mut Self, delay: &mut Delay) -> Result<()>
    where Delay: DelayUs<u16>,
    {
        self.set_update_lock(true);

        for _ in 0 .. LOCK_POLL_ITERATIONS {
            match self.poll_update_lock() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => delay.delay_us(LOCK_POLL_DELAY_US),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }

        self.set_update_lock(false);
        warn!("overlay update lock not acknowledged");
        Err(Error::Timeout)
    }

    /// Writes `words` so the overlay picks them up all at once.
    fn write_locked<Delay>(self: &mut Self, delay: &mut Delay, words: &[(u32, u32)]) -> Result<()>
    where Delay: DelayUs<u16>,
    {
        self.lock_updates(delay)?;
        self.write_all(words);
        self.set_update_lock(false);
        Ok(())
    }

    /// Applies an overlay register delta.
    pub fn apply_overlay<Delay>(self: &mut Self, delay: &mut Delay, delta: &RegisterDelta) -> Result<()>
    where Delay: DelayUs<u16>,
    {
        match delta {
            RegisterDelta::Unchanged => Ok(()),
            RegisterDelta::Hide => {
                let m = Reg::<Ov0ScaleCntl>::default()
                    .set(ScalerEnable(false))
                    .write_masked(Reg::<Ov0ScaleCntl>::field_mask::<ScalerEnable>());
                self.write_masked(m);
                Ok(())
            }
            RegisterDelta::BufferOnly(buffers) => self.write_locked(delay, &buffer_registers(buffers)),
            RegisterDelta::Full(setup, buffers) => self.write_locked(delay, &setup.registers(buffers)),
        }
    }

    /// Loads a TV encoder timing table starting at FIFO address `addr`.
    ///
    /// Codes are packed two per word, the first one in the low half.
    pub fn load_timing_table<F>(self: &mut Self, fifo: &mut F, addr: u32, table: &[u16]) -> Result<()>
    where F: TimingFifo,
    {
        for (i, pair) in table.chunks(2).enumerate() {
            let lo = pair[0] as u32;
            let hi = pair.get(1).map_or(0, |&c| c as u32);
            fifo.write_fifo(addr + i as u32, hi << 16 | lo).map_err(|_| Error::Fifo)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::vec::Vec;

    /// Register file recording writes; acknowledges the update lock if asked to
    #[derive(Default)]
    struct Regs {
        words: BTreeMap<u32, u32>,
        writes: Vec<(u32, u32)>,
        ack_lock: bool,
    }

    impl RegisterAccess for Regs {
        fn read(&mut self, addr: u32) -> u32 {
            let w = self.words.get(&addr).copied().unwrap_or(0);
            if addr == Ov0RegLoadCntl::ADDR && self.ack_lock && w & 1 != 0 {
                w | 1 << 3
            } else {
                w
            }
        }

        fn write(&mut self, addr: u32, value: u32) {
            self.writes.push((addr, value));
            self.words.insert(addr, value);
        }
    }

    #[derive(Default)]
    struct Delay(u32);

    impl DelayUs<u16> for Delay {
        fn delay_us(&mut self, _us: u16) {
            self.0 += 1;
        }
    }

    struct Fifo {
        words: Vec<(u32, u32)>,
        fail_at: Option<usize>,
    }

    impl TimingFifo for Fifo {
        type Error = ();

        fn write_fifo(&mut self, addr: u32, value: u32) -> core::result::Result<(), ()> {
            if self.fail_at == Some(self.words.len()) {
                return Err(());
            }
            self.words.push((addr, value));
            Ok(())
        }
    }

    #[test]
    fn read_modify_write_keeps_other_bits() {
        let mut regs = Regs::default();
        regs.words.insert(0x10, 0xF0F0_F0F0);
        regs.read_modify_write(0x10, 0x0000_0A0A, 0x0000_0F0F);
        assert_eq!(regs.words[&0x10], 0xF0F0_FAFA);
    }

    #[test]
    fn pll_update_is_masked() {
        let mut regs = Regs::default();
        regs.words.insert(TvPllCntl::ADDR, 0xFF00_0000);
        let mut adapter = Adapter::new(regs);
        let d = PllDividers {
            post_code: 2,
            extra_post_code: 0,
            ref_div: 30,
            feedback_div: 477,
            post_div: 4,
            extra_post_div: 1,
            freq: 0,
        };
        adapter.set_tv_pll(&d);
        let regs = adapter.release();
        assert_eq!(regs.words[&TvPllCntl::ADDR], 0xFF00_0000 | 2 << 16 | 477);
        assert_eq!(regs.words[&TvPllRefDiv::ADDR], 30);
    }

    #[test]
    fn overlay_update_is_locked() {
        let regs = Regs { ack_lock: true, ..Regs::default() };
        let mut adapter = Adapter::new(regs);
        let mut delay = Delay::default();
        adapter.apply_overlay(&mut delay, &RegisterDelta::BufferOnly([1, 2, 3])).unwrap();

        let regs = adapter.release();
        assert_eq!(regs.writes.len(), 5);
        assert_eq!(regs.writes[0], (Ov0RegLoadCntl::ADDR, 1));
        assert_eq!(regs.writes[1], (Ov0VidBuf0BaseAdrs::ADDR, 1));
        assert_eq!(regs.writes[3], (Ov0VidBuf2BaseAdrs::ADDR, 3));
        // released last
        assert_eq!(regs.writes[4].0, Ov0RegLoadCntl::ADDR);
        assert_eq!(regs.writes[4].1 & 1, 0);
        assert_eq!(delay.0, 0);
    }

    #[test]
    fn unacknowledged_lock_times_out() {
        let mut adapter = Adapter::new(Regs::default());
        let mut delay = Delay::default();
        assert_eq!(
            adapter.apply_overlay(&mut delay, &RegisterDelta::BufferOnly([1, 2, 3])),
            Err(Error::Timeout)
        );
        assert_eq!(delay.0, LOCK_POLL_ITERATIONS);

        // lock released, nothing else written
        let regs = adapter.release();
        assert_eq!(regs.writes, [(Ov0RegLoadCntl::ADDR, 1), (Ov0RegLoadCntl::ADDR, 0)]);
    }

    #[test]
    fn hide_clears_enable_only() {
        let mut regs = Regs::default();
        regs.words.insert(Ov0ScaleCntl::ADDR, 1 << 30 | 0xa << 8);
        let mut adapter = Adapter::new(regs);
        adapter.apply_overlay(&mut Delay::default(), &RegisterDelta::Hide).unwrap();
        assert_eq!(adapter.release().words[&Ov0ScaleCntl::ADDR], 0xa << 8);
    }

    #[test]
    fn timing_table_is_packed_in_pairs() {
        let mut adapter = Adapter::new(Regs::default());
        let mut fifo = Fifo { words: Vec::new(), fail_at: None };
        adapter.load_timing_table(&mut fifo, 0x100, &[0x1111, 0x2222, 0x3333]).unwrap();
        assert_eq!(fifo.words, [(0x100, 0x2222_1111), (0x101, 0x0000_3333)]);

        let mut fifo = Fifo { words: Vec::new(), fail_at: Some(1) };
        assert_eq!(
            adapter.load_timing_table(&mut fifo, 0x100, &[1, 2, 3, 4]),
            Err(Error::Fifo)
        );
    }
}
