// Domain-layer modules and shared errors/models
pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod intent {
    pub use crate::intent::*;
}

pub mod insight {
    pub use crate::insight::*;
}

pub mod automation {
    pub use crate::automation::*;
}

pub mod knowledge {
    pub use crate::knowledge::*;
}

pub mod pipeline {
    pub use crate::pipeline::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
