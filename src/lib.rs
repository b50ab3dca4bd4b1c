pub mod ape;
pub mod byte_vector;
pub mod combined;
pub mod datatypes;
pub mod editor;
pub mod id3v1;
pub mod media_file;
pub mod stream;
pub mod tag;
pub mod utils;

// 重新导出主要结构
pub use ape::{ApeItem, ApeItemValue, ApeTag};
pub use byte_vector::ByteVector;
pub use combined::{CombinedTag, ConcreteTag};
pub use datatypes::{Endianness, StringEncoding};
pub use editor::{AccessMode, FileEditor, DEFAULT_BUFFER_SIZE};
pub use id3v1::Id3v1Tag;
pub use media_file::{scan_paths, FileKind, MediaFile, TaggedFile};
pub use stream::{FileStream, LocalFile, MemoryStream};
pub use tag::{Picture, Tag, TagData, TagType};
pub use utils::{create_backup, TagError};

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "mp2", "ape", "mpc", "wv"];
