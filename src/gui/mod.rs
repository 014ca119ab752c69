//! Editor and viewer window

mod app;
mod canvas;
mod constants;
mod element_panel;

pub use app::{Mode, run_board};
