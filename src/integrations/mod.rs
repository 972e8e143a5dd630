//! External service integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod intelligence {
    pub use crate::intelligence::*;
}
