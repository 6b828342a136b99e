//! Static analysis over definition sets.
pub mod integrity;
pub mod topology;
