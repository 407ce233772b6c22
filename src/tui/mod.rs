pub mod commands;
pub mod event_loop;
pub mod rendering;
pub mod state;
pub mod theme;
pub mod view;

pub use view::TuiApp;
