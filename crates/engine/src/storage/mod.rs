mod atomic_io;

pub use atomic_io::{write_bytes_atomic, write_text_atomic, write_text_atomic_with_retry};
