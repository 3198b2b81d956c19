pub mod serial;
pub mod stdio;
pub mod traits;

pub use serial::SerialConnector;
pub use stdio::StdioConnector;
pub use traits::{OperatorConnector, OperatorStream};
