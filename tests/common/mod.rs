use std::collections::BTreeMap;

use embedded_hal::blocking::delay::DelayUs;
use radeon_timing::device::RegisterAccess;

/// Register file counting every access; the overlay update lock is
/// acknowledged as soon as it is set.
#[derive(Default)]
pub struct MockRegs {
    pub words: BTreeMap<u32, u32>,
    pub writes: Vec<(u32, u32)>,
    pub reads: usize,
}

const OV0_REG_LOAD_CNTL: u32 = 0x0410;

impl RegisterAccess for MockRegs {
    fn read(&mut self, addr: u32) -> u32 {
        self.reads += 1;
        let w = self.words.get(&addr).copied().unwrap_or(0);
        if addr == OV0_REG_LOAD_CNTL && w & 1 != 0 {
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
pub struct MockDelay {
    pub calls: u32,
}

impl DelayUs<u16> for MockDelay {
    fn delay_us(&mut self, _us: u16) {
        self.calls += 1;
    }
}
