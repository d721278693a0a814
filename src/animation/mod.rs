/// Easing curves for transition progress.
pub mod ease;
