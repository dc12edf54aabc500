pub const SUCCESS: i32 = 0;
/// Bad arguments, missing or undecodable input, invalid configuration
pub const INPUT_ERROR: i32 = 1;
/// Processing or output failure
pub const EXECUTION_ERROR: i32 = 2;
/// Interrupted before completion
pub const CANCELLED: i32 = 130;
