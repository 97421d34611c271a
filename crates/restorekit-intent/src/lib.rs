mod error;
mod intent;
mod manager;
mod stream_handle;

pub use error::IntentError;
pub use intent::{Intent, IntentKind};
pub use manager::{FinalizeOrder, IntentManager, OplogSource};
pub use stream_handle::StreamHandle;
