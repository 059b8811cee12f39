//! Jenkins archive access: build directory layout and `build.xml` decoding.

pub mod causes;
pub mod layout;
pub mod report;
mod xml;

pub use causes::{interpret, CauseKind};
pub use layout::{builds_dir, list_build_dirs, BuildDirectory};
pub use report::{read_report, BuildReport};
