/// Clip tree and derived timing.
pub mod clip;
/// Time expressions.
pub mod expr;
