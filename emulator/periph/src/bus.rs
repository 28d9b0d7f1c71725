/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    Register bus of the emulated Latte SoC. Routes MMIO to the OTP and AES
    peripherals and models the AES engine's DMA into host memory.

--*/

use crate::{AesCommand, AesEngine, Otp, OTP_SIZE};
use latte_config::LatteMemoryMap;
use log::{trace, warn};
use romtime::{AhbSource, AhbTarget, Coherency, Mmio};

/// First bus address handed out to a DMA-visible region.
const DMA_BASE: u32 = 0x1000_0000;
const DMA_ALIGN: u32 = 0x1000;
/// Returned by `dma_addr` for memory that was never flushed or invalidated.
pub const UNMAPPED_DMA_ADDR: u32 = 0xffff_f000;

/// Bus activity relevant to cache coherency, in the order it happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Flush { addr: usize, len: usize },
    Invalidate { addr: usize, len: usize },
    AhbFlushTo(AhbTarget),
    AhbFlushFrom(AhbSource),
    /// Control word written to the AES engine with EXEC set.
    Command(u32),
}

/// Host memory made reachable by the engine for the current operation.
#[derive(Clone, Copy, Debug)]
struct DmaRegion {
    host: usize,
    len: usize,
    bus: u32,
}

pub struct LatteBus {
    map: LatteMemoryMap,
    pub otp: Otp,
    pub aes: AesEngine,
    regions: Vec<DmaRegion>,
    next_bus: u32,
    events: Vec<BusEvent>,
}

impl LatteBus {
    pub fn new(map: LatteMemoryMap, fuses: [u8; OTP_SIZE]) -> Self {
        Self::with_otp(map, Otp::new(fuses))
    }

    pub fn with_otp(map: LatteMemoryMap, otp: Otp) -> Self {
        Self {
            map,
            otp,
            aes: AesEngine::new(),
            regions: Vec::new(),
            next_bus: DMA_BASE,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn map_region(&mut self, addr: *const u8, len: usize) {
        let host = addr as usize;
        if self
            .regions
            .iter()
            .any(|r| r.host <= host && host + len <= r.host + r.len)
        {
            return;
        }
        let bus = self.next_bus;
        let span = (len as u32).next_multiple_of(DMA_ALIGN).max(DMA_ALIGN);
        self.next_bus = self.next_bus.wrapping_add(span);
        self.regions.push(DmaRegion { host, len, bus });
    }

    fn host_addr(&self, bus: u32, len: usize) -> Option<usize> {
        self.regions.iter().find_map(|r| {
            let offset = bus.checked_sub(r.bus)? as usize;
            (offset + len <= r.len).then_some(r.host + offset)
        })
    }

    fn run_dma(&mut self, cmd: AesCommand) {
        let len = cmd.byte_len();
        let (Some(src), Some(dst)) = (self.host_addr(cmd.src, len), self.host_addr(cmd.dest, len))
        else {
            warn!(
                "[latte-emu] AES DMA to unmapped memory: src {:#x} dest {:#x}",
                cmd.src, cmd.dest
            );
            self.aes.wedge();
            return;
        };
        let mut data = vec![0u8; len];
        // SAFETY: both ranges were registered through flush_range/invalidate_range by
        // a driver that holds borrows of them for the whole operation.
        unsafe { core::ptr::copy_nonoverlapping(src as *const u8, data.as_mut_ptr(), len) };
        self.aes.process(&cmd, &mut data);
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, len) };
    }
}

impl Mmio for LatteBus {
    fn read32(&mut self, addr: u32) -> u32 {
        if addr == self.map.aes_ctrl {
            self.aes.read_ctrl()
        } else if addr == self.map.aes_src {
            self.aes.src()
        } else if addr == self.map.aes_dest {
            self.aes.dest()
        } else if addr == self.map.otp_data {
            self.otp.read_data()
        } else {
            warn!("[latte-emu] read from unmapped register {:#010x}", addr);
            0
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        trace!("[latte-emu] {:#010x} <- {:#010x}", addr, value);
        if addr == self.map.aes_ctrl {
            if let Some(cmd) = self.aes.write_ctrl(value) {
                self.events.push(BusEvent::Command(value));
                self.run_dma(cmd);
            }
        } else if addr == self.map.aes_src {
            self.aes.write_src(value);
        } else if addr == self.map.aes_dest {
            self.aes.write_dest(value);
        } else if addr == self.map.aes_key {
            self.aes.write_key(value);
        } else if addr == self.map.aes_iv {
            self.aes.write_iv(value);
        } else if addr == self.map.otp_cmd {
            self.otp.write_cmd(value);
        } else {
            warn!("[latte-emu] write to unmapped register {:#010x}", addr);
        }
    }
}

impl Coherency for LatteBus {
    fn flush_range(&mut self, addr: *const u8, len: usize) {
        self.events.push(BusEvent::Flush {
            addr: addr as usize,
            len,
        });
        self.map_region(addr, len);
    }

    fn invalidate_range(&mut self, addr: *const u8, len: usize) {
        self.events.push(BusEvent::Invalidate {
            addr: addr as usize,
            len,
        });
        self.map_region(addr, len);
    }

    fn ahb_flush_to(&mut self, target: AhbTarget) {
        self.events.push(BusEvent::AhbFlushTo(target));
        if target == AhbTarget::Iod {
            // the engine is done with this operation's buffers
            self.regions.clear();
        }
    }

    fn ahb_flush_from(&mut self, source: AhbSource) {
        self.events.push(BusEvent::AhbFlushFrom(source));
    }

    fn dma_addr(&self, addr: *const u8) -> u32 {
        let host = addr as usize;
        self.regions
            .iter()
            .find(|r| r.host <= host && host < r.host + r.len)
            .map(|r| r.bus + (host - r.host) as u32)
            .unwrap_or(UNMAPPED_DMA_ADDR)
    }
}
