mod provision;

pub use provision::{manual_instructions, provision};
