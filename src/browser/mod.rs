//! Browser session seam
//!
//! The pipeline only ever sees a stream of [`BrowserEvent`]s. Where they come
//! from is pluggable: an external driver process, a recorded HAR file, or a
//! scripted mock in tests.

pub mod driver;
pub mod error;
pub mod events;
pub mod har;
pub mod mock;
pub mod session;
pub mod stream;

pub use driver::DriverSession;
pub use error::SessionError;
pub use events::{BrowserEvent, ResponseEvent};
pub use har::HarSession;
pub use session::{BrowserSession, SessionHandle};
