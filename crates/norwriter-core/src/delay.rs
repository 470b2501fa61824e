//! Post-command settle delay
//!
//! Intel parts need a short time (tWB) after a command write before the
//! status register is valid. Flash algorithms often run without a timer, so
//! this is a plain counted spin. The right count depends on the CPU clock;
//! see [`Config::delay_loops`](crate::algorithm::Config::delay_loops).

/// Spin for `loops` iterations
///
/// `black_box` keeps the optimizer from folding the loop away.
#[inline(never)]
pub fn busy_wait(loops: u32) {
    for i in 0..loops {
        core::hint::black_box(i);
        core::hint::spin_loop();
    }
}
