#![cfg_attr(not(test), no_std)]

///! Radeon display pipeline timing: pixel / TV PLL dividers,
///! CRT to TV-out frame rate matching, TV encoder and overlay scaler setup.

pub mod constants;
pub mod fixed;
pub mod errors;
pub mod pll;
pub mod timing;
pub mod standard;
pub mod tv;
pub mod overlay;
pub mod register;
pub mod config;
pub mod device;
