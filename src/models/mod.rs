pub mod config_doc;
pub mod job;
pub mod result;
pub mod stage;

pub use config_doc::*;
pub use job::*;
pub use result::*;
pub use stage::*;
