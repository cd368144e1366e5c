mod app;
mod event;
mod input;
pub mod ui;

pub use app::{GenerationJob, SurveyApp};
pub use event::{Event, EventHandler};
pub use input::handle_key;
