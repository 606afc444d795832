pub mod check;
pub mod hash;
pub mod scan;
pub mod stats;
