mod device;
mod prefix;
mod rule;
mod topology;

pub use device::*;
pub use prefix::*;
pub use rule::*;
pub use topology::*;
