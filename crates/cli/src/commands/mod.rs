pub mod report;
pub mod status;
pub mod util;
pub mod wrap;

pub use report::*;
pub use status::*;
pub use util::*;
pub use wrap::*;
