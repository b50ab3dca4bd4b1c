use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::byte_vector::ByteVector;
use crate::stream::{FileStream, LocalFile};
use crate::utils::TagError;

/// 默认缓冲窗口大小
///
/// 窗口大小只是实现参数，不影响查找与块编辑的可见行为；
/// 测试会用多种窗口大小验证这一点。
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// 编辑会话的访问模式
///
/// 模式转移是单向的：写权限可以被放弃（ReadWrite -> ReadOnly），
/// 会话可以被关闭，但永远不会重新获得权限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    Closed,
}

/// 随机访问文件编辑器
///
/// 标签编解码器依赖的核心引擎：在有界内存内完成跨缓冲区的模式查找，
/// 以及任意长度差的块插入/替换/删除。会话独占其文件资源，
/// 关闭（或析构）时保证调用资源的关闭回调。
pub struct FileEditor {
    stream: Box<dyn FileStream>,
    position: u64,
    length: u64,
    mode: AccessMode,
    buffer_size: usize,
}

impl FileEditor {
    /// 绑定资源创建编辑会话
    pub fn new(stream: Box<dyn FileStream>) -> Result<Self, TagError> {
        Self::with_buffer_size(stream, DEFAULT_BUFFER_SIZE)
    }

    /// 使用指定缓冲窗口大小创建编辑会话
    pub fn with_buffer_size(
        mut stream: Box<dyn FileStream>,
        buffer_size: usize,
    ) -> Result<Self, TagError> {
        let length = stream.length()?;
        let mode = if stream.is_read_only() {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        Ok(FileEditor {
            stream,
            position: 0,
            length,
            mode,
            buffer_size: buffer_size.max(1),
        })
    }

    /// 以读写模式打开磁盘文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TagError> {
        Self::new(Box::new(LocalFile::open(path)?))
    }

    /// 以只读模式打开磁盘文件
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, TagError> {
        Self::new(Box::new(LocalFile::open_read_only(path)?))
    }

    /// 资源名称
    pub fn name(&self) -> &str {
        self.stream.name()
    }

    /// 当前访问模式
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// 文件总长度（结构性编辑后自动更新）
    pub fn length(&self) -> u64 {
        self.length
    }

    /// 当前读写游标位置
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// 缓冲窗口大小
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// 放弃写权限（单向转移，已关闭的会话不受影响）
    pub fn relinquish_write(&mut self) {
        if self.mode == AccessMode::ReadWrite {
            self.mode = AccessMode::ReadOnly;
        }
    }

    fn ensure_open(&self) -> Result<(), TagError> {
        if self.mode == AccessMode::Closed {
            return Err(TagError::AccessDenied(format!(
                "editor for {} is closed",
                self.stream.name()
            )));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), TagError> {
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(TagError::AccessDenied(format!(
                "editor for {} is read-only",
                self.stream.name()
            ))),
            AccessMode::Closed => Err(TagError::AccessDenied(format!(
                "editor for {} is closed",
                self.stream.name()
            ))),
        }
    }

    /// 移动游标（允许定位到文件末尾）
    pub fn seek(&mut self, offset: u64) -> Result<(), TagError> {
        self.ensure_open()?;
        if offset > self.length {
            return Err(TagError::OutOfRange(format!(
                "seek offset {} beyond length {}",
                offset, self.length
            )));
        }
        self.position = offset;
        Ok(())
    }

    /// 从游标处读取至多`length`字节并前移游标
    ///
    /// 到达文件末尾时按可用字节截断。
    pub fn read_block(&mut self, length: usize) -> Result<ByteVector, TagError> {
        self.ensure_open()?;
        let available = (self.length - self.position) as usize;
        let take = length.min(available);
        let data = self.read_at(self.position, take)?;
        self.position += data.len() as u64;
        Ok(ByteVector::from(data))
    }

    /// 在游标处覆写数据并前移游标（可越过原末尾扩展文件）
    pub fn write_block(&mut self, data: &ByteVector) -> Result<(), TagError> {
        self.ensure_writable()?;
        self.write_at(self.position, data.as_slice())?;
        self.position += data.len() as u64;
        self.length = self.length.max(self.position);
        Ok(())
    }

    /// 正向缓冲查找
    ///
    /// 与一次性读入全文件的朴素查找结果一致，但任意时刻只持有一个
    /// 缓冲窗口。相邻窗口重叠`pattern.len() - 1`字节，保证跨越窗口
    /// 边界的匹配不会丢失。`before`（若给出）限制匹配起始偏移。
    /// 查找不移动编辑器游标。
    pub fn find(
        &mut self,
        pattern: &[u8],
        from: u64,
        before: Option<u64>,
    ) -> Result<Option<u64>, TagError> {
        self.ensure_open()?;
        if pattern.is_empty() || (pattern.len() as u64) > self.length {
            return Ok(None);
        }

        let pattern_len = pattern.len() as u64;
        let limit = before.unwrap_or(self.length).min(self.length);
        let window = self.buffer_size.max(pattern.len());

        let mut window_start = from;
        'windows: while window_start < limit && window_start + pattern_len <= self.length {
            let chunk = self.read_at(window_start, window)?;
            if chunk.len() < pattern.len() {
                break;
            }

            for i in 0..=(chunk.len() - pattern.len()) {
                let absolute = window_start + i as u64;
                if absolute >= limit {
                    break 'windows;
                }
                if chunk[i..i + pattern.len()] == *pattern {
                    return Ok(Some(absolute));
                }
            }

            if window_start + chunk.len() as u64 >= self.length {
                break;
            }
            window_start += (chunk.len() - (pattern.len() - 1)) as u64;
        }
        Ok(None)
    }

    /// 反向缓冲查找
    ///
    /// 从`from`（默认末尾）向文件头方向逐窗口回退，返回起始偏移
    /// 最大的匹配。用于定位尾部结构而无需正向扫描整个文件。
    pub fn rfind(&mut self, pattern: &[u8], from: Option<u64>) -> Result<Option<u64>, TagError> {
        self.ensure_open()?;
        if pattern.is_empty() || (pattern.len() as u64) > self.length {
            return Ok(None);
        }

        let pattern_len = pattern.len() as u64;
        let last_start = self.length - pattern_len;
        let upper = from.unwrap_or(last_start).min(last_start);
        let window = self.buffer_size.max(pattern.len()) as u64;

        // window_end是候选匹配的排他性上界
        let mut window_end = upper + pattern_len;
        loop {
            let window_start = window_end.saturating_sub(window);
            let chunk = self.read_at(window_start, (window_end - window_start) as usize)?;

            if chunk.len() >= pattern.len() {
                for i in (0..=(chunk.len() - pattern.len())).rev() {
                    if chunk[i..i + pattern.len()] == *pattern {
                        return Ok(Some(window_start + i as u64));
                    }
                }
            }

            if window_start == 0 {
                break;
            }
            // 回退时保留pattern.len()-1字节重叠
            window_end = window_start + (pattern_len - 1);
        }
        Ok(None)
    }

    /// 在`at`处插入数据块，后续内容后移
    pub fn insert_block(&mut self, data: &ByteVector, at: u64) -> Result<(), TagError> {
        self.replace_block(at, 0, data)
    }

    /// 删除`[at, at + length)`区间，后续内容前移
    pub fn remove_block(&mut self, at: u64, length: u64) -> Result<(), TagError> {
        self.replace_block(at, length, &ByteVector::new())
    }

    /// 将`[at, at + original_length)`替换为`data`
    ///
    /// 新旧长度可以不同：增长时尾部内容从远端开始逐窗口后移
    /// （避免源字节在读取前被覆盖），缩小时从近端开始前移并截断。
    /// 所有边界在任何写入发生前验证完毕；验证失败不产生副作用。
    /// 外部可见效果等价于"全量读入、拼接、全量写回"，但峰值内存
    /// 以窗口大小为界。
    pub fn replace_block(
        &mut self,
        at: u64,
        original_length: u64,
        data: &ByteVector,
    ) -> Result<(), TagError> {
        self.ensure_writable()?;

        let end = at.checked_add(original_length).ok_or_else(|| {
            TagError::OutOfRange(format!(
                "replace range {}+{} overflows",
                at, original_length
            ))
        })?;
        if end > self.length {
            return Err(TagError::OutOfRange(format!(
                "replace range [{}, {}) beyond length {}",
                at, end, self.length
            )));
        }

        let data_length = data.len() as u64;
        let tail_length = self.length - end;
        let window = self.buffer_size as u64;

        if data_length == original_length {
            // 等长：原地覆写，无需移动
            if !data.is_empty() {
                self.write_at(at, data.as_slice())?;
            }
        } else if data_length > original_length {
            let delta = data_length - original_length;

            // 增长：尾部后移，从远端开始
            let mut remaining = tail_length;
            while remaining > 0 {
                let chunk_length = window.min(remaining);
                let source = end + remaining - chunk_length;
                let chunk = self.read_exact_at(source, chunk_length as usize)?;
                self.write_at(source + delta, &chunk)?;
                remaining -= chunk_length;
            }
            self.write_at(at, data.as_slice())?;
        } else {
            let delta = original_length - data_length;

            // 缩小：尾部前移，从近端开始
            let mut copied = 0u64;
            while copied < tail_length {
                let chunk_length = window.min(tail_length - copied);
                let chunk = self.read_exact_at(end + copied, chunk_length as usize)?;
                self.write_at(at + data_length + copied, &chunk)?;
                copied += chunk_length;
            }
            if !data.is_empty() {
                self.write_at(at, data.as_slice())?;
            }
            self.stream.truncate(self.length - delta)?;
        }

        self.stream.flush().map_err(TagError::IoError)?;
        self.length = self.length - original_length + data_length;
        self.position = at + data_length;
        Ok(())
    }

    /// 关闭会话：刷新、调用资源关闭回调（恰好一次）
    ///
    /// 关闭后所有操作失败；重复关闭是无害的空操作。
    pub fn close(&mut self) -> Result<(), TagError> {
        if self.mode == AccessMode::Closed {
            return Ok(());
        }
        self.mode = AccessMode::Closed;

        let flush_result = self.stream.flush();
        let close_result = self.stream.close();
        flush_result.map_err(TagError::IoError)?;
        close_result
    }

    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, TagError> {
        self.stream.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        let mut filled = 0;
        while filled < length {
            let n = self.stream.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);
        Ok(buffer)
    }

    fn read_exact_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, TagError> {
        let chunk = self.read_at(offset, length)?;
        if chunk.len() != length {
            // 移动阶段的短读说明底层资源与缓存长度不一致
            return Err(TagError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "short read at {}: expected {} bytes, got {}",
                    offset,
                    length,
                    chunk.len()
                ),
            )));
        }
        Ok(chunk)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), TagError> {
        self.stream.seek(SeekFrom::Start(offset))?;
        self.stream.write_all(data)?;
        Ok(())
    }
}

impl Drop for FileEditor {
    fn drop(&mut self) {
        // 关闭回调必须在所有退出路径上执行
        if self.mode != AccessMode::Closed {
            let _ = self.close();
        }
    }
}
