// MIT License - Copyright (c) 2026 Peter Wright

//! Typed views of the devices reported by the central.

pub mod partition;
pub mod peripheral;
pub mod zone;
