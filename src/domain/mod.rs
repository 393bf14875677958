mod period;
mod record;

pub use period::*;
pub use record::*;
