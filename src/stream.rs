use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::utils::TagError;

/// 文件资源抽象
///
/// 编辑器对存储介质的最小要求：同一个句柄上交替进行读/写/定位。
/// 底层资源由调用方提供（磁盘文件、内存数据等），编辑器在会话期间
/// 独占使用，关闭时通过`close`归还。
pub trait FileStream: Read + Write + Seek {
    /// 资源的逻辑名称
    fn name(&self) -> &str;

    /// 资源当前总长度
    fn length(&mut self) -> Result<u64, TagError>;

    /// 截断或扩展到指定长度
    fn truncate(&mut self, new_length: u64) -> Result<(), TagError>;

    /// 是否只读
    fn is_read_only(&self) -> bool;

    /// 关闭回调（刷新并释放底层资源）
    fn close(&mut self) -> Result<(), TagError>;
}

/// 磁盘文件资源
pub struct LocalFile {
    name: String,
    file: File,
    read_only: bool,
}

impl LocalFile {
    /// 以读写模式打开
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(LocalFile {
            name: path.display().to_string(),
            file,
            read_only: false,
        })
    }

    /// 以只读模式打开
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(LocalFile {
            name: path.display().to_string(),
            file,
            read_only: true,
        })
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LocalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl FileStream for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&mut self) -> Result<u64, TagError> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(&mut self, new_length: u64) -> Result<(), TagError> {
        if self.read_only {
            return Err(TagError::AccessDenied(format!(
                "cannot truncate read-only file {}",
                self.name
            )));
        }
        self.file.set_len(new_length)?;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn close(&mut self) -> Result<(), TagError> {
        self.file.flush()?;
        Ok(())
    }
}

/// 内存数据资源
///
/// 用于测试与无盘场景，行为与磁盘文件一致（含越界写入补零）。
pub struct MemoryStream {
    name: String,
    cursor: Cursor<Vec<u8>>,
    read_only: bool,
}

impl MemoryStream {
    /// 创建可写的内存资源
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        MemoryStream {
            name: name.into(),
            cursor: Cursor::new(data),
            read_only: false,
        }
    }

    /// 创建只读的内存资源
    pub fn new_read_only(name: impl Into<String>, data: Vec<u8>) -> Self {
        MemoryStream {
            name: name.into(),
            cursor: Cursor::new(data),
            read_only: true,
        }
    }

    /// 访问当前内容
    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only memory stream",
            ));
        }
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl FileStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&mut self) -> Result<u64, TagError> {
        Ok(self.cursor.get_ref().len() as u64)
    }

    fn truncate(&mut self, new_length: u64) -> Result<(), TagError> {
        if self.read_only {
            return Err(TagError::AccessDenied(format!(
                "cannot truncate read-only memory stream {}",
                self.name
            )));
        }
        self.cursor.get_mut().resize(new_length as usize, 0);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn close(&mut self) -> Result<(), TagError> {
        Ok(())
    }
}
