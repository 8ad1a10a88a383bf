pub mod corpus;
pub mod hash;
pub mod interrupt;
pub mod io;
pub mod session;
pub mod slot;
pub mod stats;
pub mod table;
pub mod timer;

pub mod prelude {
    pub use crate::session::{Session, SessionOptions};
    pub use crate::table::RainbowTable;
}
