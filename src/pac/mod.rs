pub mod can;
pub mod common;

#[cfg(feature = "f4")]
pub(crate) mod gpio;

#[cfg(feature = "f4")]
pub(crate) mod rcc;

#[cfg(feature = "f4")]
pub(crate) mod mapping {
    pub(crate) const RCC_REGISTER_BLOCK_ADDR: *mut () = 0x4002_3800 as *mut ();
    pub(crate) const GPIOB_REGISTER_BLOCK_ADDR: *mut () = 0x4002_0400 as *mut ();
    pub(crate) const CAN1_REGISTER_BLOCK_ADDR: *mut () = 0x4000_6400 as *mut ();
}

#[cfg(feature = "f4")]
pub(crate) use mapping::*;
