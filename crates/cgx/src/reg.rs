//! Register banks of the graphics pipeline.
//!
//! Each bank has its own opcode and its own wire encoding, see [`crate::codec`].
pub mod bp;
pub mod cp;
pub mod pix;
pub mod xf;
