pub mod http;
pub mod traits;

pub use traits::{CaptureResult, RemoteCamera};
