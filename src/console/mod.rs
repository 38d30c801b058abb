pub mod view;

pub use view::{ConsoleView, Notice, UiSnapshot};
