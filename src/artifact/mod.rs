//! Image assembly.
//!
//! - [`iso`] - the assembly sequence and the `xorriso` invocation
//! - [`initramfs`] - initramfs root population and regular-file discovery
//! - [`cpio`] - newc archive creation
//! - [`limine`] - bootloader files, `limine.cfg` and the installer
//! - [`disk`] - the companion `disk.img`
//! - [`filesystem`] - directory recreation, copies, atomic moves

pub mod cpio;
pub mod disk;
pub mod filesystem;
pub mod initramfs;
pub mod iso;
pub mod limine;

pub use iso::assemble;
