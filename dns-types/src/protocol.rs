pub mod deserialise;
pub mod serialise;
pub mod types;

pub use deserialise::Error as DeserialiseError;
pub use serialise::Error as SerialiseError;
pub use types::*;
