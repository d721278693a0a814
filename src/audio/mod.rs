/// Audio tracks and their placement on the final timeline.
pub mod track;
