pub(crate) mod composite;
/// Transition definitions.
pub mod transitions;
