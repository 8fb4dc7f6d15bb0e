mod handle;
mod platform;

pub(crate) use handle::*;
pub(crate) use platform::*;
