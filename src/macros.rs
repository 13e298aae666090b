//! Placement of code that runs while DRAM is unreachable.
//!
//! On bare-metal targets the linker script has to run `.sram.text`,
//! `.sram.rodata` and `.sram.resume` from always-on scratch memory. Startup
//! copies the first two there; `SramImage::build_linked` copies the resume
//! section into the image. Helpers reached from these functions must be
//! marked the same way or be `#[inline(always)]`, and the crate has to be
//! built with optimizations so the `volatile` and `bitbybit` accessors
//! inline.

/// Functions of the frequency change path.
macro_rules! sram_text {
    ($($it:item)*) => {
        $(
            #[cfg_attr(target_os = "none", link_section = ".sram.text")]
            #[inline(never)]
            $it
        )*
    };
}

/// Functions copied into the resume code region.
macro_rules! sram_resume {
    ($($it:item)*) => {
        $(
            #[cfg_attr(target_os = "none", link_section = ".sram.resume")]
            #[inline(never)]
            $it
        )*
    };
}

/// Tables read on either path.
macro_rules! sram_rodata {
    ($($it:item)*) => {
        $(
            #[cfg_attr(target_os = "none", link_section = ".sram.rodata")]
            $it
        )*
    };
}
