/// IEEE-754 layout conversion used by the float read/write paths.
mod float;
/// Bit cursor for decoding frames.
pub mod reader;
/// Typed value codec over the bit cursors.
pub mod value_codec;
/// Growable bit writer for encoding frames.
pub mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;
