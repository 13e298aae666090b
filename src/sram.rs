//! Image placed in always-on scratch memory.
//!
//! ```text
//! +--------------------------+ 0
//! | resume code (0x880 B)    |
//! +--------------------------+ RESUME_CODE_BYTES
//! | SequencerData            |
//! |   ControllerSnapshot     |  <- resume data blob
//! |   PllSetting, gates, ... |
//! +--------------------------+
//! ```
//!
//! Offsets are published through a relocation table so callers never
//! assume where a piece landed. On bare metal the resume code is the
//! `.sram.resume` section, linked to run at the scratch region's address:
//! `__sram_resume_start`/`__sram_resume_end` bound it there and
//! `__sram_resume_load` is where the loader left its bytes.

use crate::error::{DramError, Result};
#[cfg(target_os = "none")]
use crate::ram::resume::resume_entry;
use crate::ram::sequencer::SequencerData;
use crate::ram::snapshot::ControllerSnapshot;

pub const RESUME_CODE_BYTES: usize = 0x880;
const CODE_WORDS: usize = RESUME_CODE_BYTES / 4;
const DATA_WORDS: usize = core::mem::size_of::<SequencerData>() / 4;
const PAGE_WORDS: usize = 4096 / 4;

/// Total words an image needs.
pub const IMAGE_WORDS: usize = CODE_WORDS + DATA_WORDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    ResumeCode,
    /// `resume::resume_entry` inside the resume code.
    ResumeEntry,
    SequencerData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub symbol: Symbol,
    /// Byte offset from the start of the region.
    pub offset: usize,
    pub len: usize,
}

/// The linked `.sram.resume` section and the offset of `resume_entry` in it.
#[cfg(target_os = "none")]
pub fn linked_resume_code() -> (&'static [u8], usize) {
    extern "C" {
        static __sram_resume_start: u8;
        static __sram_resume_end: u8;
        static __sram_resume_load: u8;
    }
    // SAFETY: the linker script defines the three symbols, start before
    // end, and nothing writes the load image.
    unsafe {
        let start = core::ptr::addr_of!(__sram_resume_start) as usize;
        let end = core::ptr::addr_of!(__sram_resume_end) as usize;
        let load = core::ptr::addr_of!(__sram_resume_load);
        let entry = (resume_entry as usize).wrapping_sub(start);
        (core::slice::from_raw_parts(load, end - start), entry)
    }
}

/// Hosted builds have no resume section.
#[cfg(not(target_os = "none"))]
pub fn linked_resume_code() -> (&'static [u8], usize) {
    (&[], 0)
}

pub struct SramImage<'a> {
    region: &'a mut [u32],
    relocations: [Relocation; 3],
}

impl<'a> SramImage<'a> {
    /// Image whose resume code is this crate's own `.sram.resume` section.
    pub fn build_linked(region: &'a mut [u32]) -> Result<Self> {
        let (code, entry) = linked_resume_code();
        Self::build_with_entry(region, code, entry)
    }

    /// Copies `resume_code` to the start of `region` and lays a zeroed
    /// `SequencerData` after it. The code is entered at its first byte.
    pub fn build(region: &'a mut [u32], resume_code: &[u8]) -> Result<Self> {
        Self::build_with_entry(region, resume_code, 0)
    }

    fn build_with_entry(region: &'a mut [u32], resume_code: &[u8], entry: usize) -> Result<Self> {
        if resume_code.len() > RESUME_CODE_BYTES {
            return Err(DramError::ResumeCodeTooLarge { len: resume_code.len(), max: RESUME_CODE_BYTES });
        }
        if entry > resume_code.len() {
            return Err(DramError::InvalidConfig);
        }
        if region.len() < IMAGE_WORDS {
            return Err(DramError::SramTooSmall { need: IMAGE_WORDS, have: region.len() });
        }

        region[..CODE_WORDS].fill(0);
        for (word, chunk) in region.iter_mut().zip(resume_code.chunks(4)) {
            let mut bytes = [0u8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(bytes);
        }

        let relocations = [
            Relocation { symbol: Symbol::ResumeCode, offset: 0, len: RESUME_CODE_BYTES },
            Relocation {
                symbol: Symbol::ResumeEntry,
                offset: entry,
                len: RESUME_CODE_BYTES - entry,
            },
            Relocation {
                symbol: Symbol::SequencerData,
                offset: RESUME_CODE_BYTES,
                len: DATA_WORDS * 4,
            },
        ];
        let mut image = SramImage { region, relocations };
        *image.data_mut() = SequencerData::zeroed();
        Ok(image)
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    pub fn relocation(&self, symbol: Symbol) -> Relocation {
        match symbol {
            Symbol::ResumeCode => self.relocations[0],
            Symbol::ResumeEntry => self.relocations[1],
            Symbol::SequencerData => self.relocations[2],
        }
    }

    /// Address `symbol` landed at.
    pub fn symbol_addr(&self, symbol: Symbol) -> usize {
        self.region.as_ptr() as usize + self.relocation(symbol).offset
    }

    pub fn data(&self) -> &SequencerData {
        // SAFETY: `build` checked the region holds IMAGE_WORDS words, the
        // data starts on a word boundary and SequencerData is repr(C) made
        // of u32 fields only, so any bit pattern is valid.
        unsafe { &*(self.region.as_ptr().add(CODE_WORDS) as *const SequencerData) }
    }

    pub fn data_mut(&mut self) -> &mut SequencerData {
        // SAFETY: see `data`; the exclusive borrow of self covers the region.
        unsafe { &mut *(self.region.as_mut_ptr().add(CODE_WORDS) as *mut SequencerData) }
    }

    pub fn snapshot(&self) -> &ControllerSnapshot {
        &self.data().snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut ControllerSnapshot {
        &mut self.data_mut().snapshot
    }

    pub fn resume_code_blob(&self) -> &[u8] {
        // SAFETY: the first CODE_WORDS words are initialised and u8 has no
        // alignment requirement.
        unsafe { core::slice::from_raw_parts(self.region.as_ptr() as *const u8, RESUME_CODE_BYTES) }
    }

    pub fn resume_data_blob(&self) -> &[u8] {
        self.snapshot().as_bytes()
    }

    /// Reads one word per page so no TLB miss or page walk is left for the
    /// window where DRAM is unreachable.
    pub fn pretouch(&self) {
        let words = &self.region[..IMAGE_WORDS];
        for i in (0..words.len()).step_by(PAGE_WORDS) {
            // SAFETY: `i` is in bounds of `words`.
            unsafe { core::ptr::read_volatile(words.as_ptr().add(i)) };
        }
        // SAFETY: IMAGE_WORDS > 0.
        unsafe { core::ptr::read_volatile(words.as_ptr().add(words.len() - 1)) };
    }
}
