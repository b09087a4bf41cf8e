pub mod bucket;
pub use bucket::*;
pub mod candidate;
pub use candidate::*;
