//! Storage adapters behind the knowledge writer.

pub mod db {
    pub use crate::db::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod cache_store {
    pub use crate::cache_store::*;
}
