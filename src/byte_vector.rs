use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::datatypes::{Endianness, StringEncoding};
use crate::utils::TagError;

/// 二进制数据缓冲区
///
/// 标签解析与重建的基本数据单元：既作为内存中的暂存区，
/// 也作为与文件编辑器交换数据的载体。
///
/// # 特性
/// - 支持模式查找（正向/反向）与切片
/// - 定宽数值编解码（可选字节序）
/// - 多编码字符串编解码
///
/// 值语义：按持有者独占，复制必须显式进行，内部存储永不被别名共享。
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteVector {
    data: Vec<u8>,
}

impl ByteVector {
    /// 创建空缓冲区
    pub fn new() -> Self {
        ByteVector { data: Vec::new() }
    }

    /// 创建指定长度的缓冲区，以`fill`填充
    pub fn with_size(length: usize, fill: u8) -> Self {
        ByteVector {
            data: vec![fill; length],
        }
    }

    /// 从字节切片创建
    pub fn from_slice(data: &[u8]) -> Self {
        ByteVector {
            data: data.to_vec(),
        }
    }

    /// 缓冲区长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 以切片形式访问内容
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 取出内部字节
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// 按索引读取单个字节（越界报错）
    pub fn at(&self, index: usize) -> Result<u8, TagError> {
        self.data.get(index).copied().ok_or_else(|| {
            TagError::OutOfRange(format!(
                "index {} out of range (length {})",
                index,
                self.data.len()
            ))
        })
    }

    /// 追加字节
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// 在指定位置插入字节（offset不能越过末尾）
    pub fn insert(&mut self, offset: usize, data: &[u8]) -> Result<(), TagError> {
        if offset > self.data.len() {
            return Err(TagError::OutOfRange(format!(
                "insert offset {} out of range (length {})",
                offset,
                self.data.len()
            )));
        }
        self.data.splice(offset..offset, data.iter().copied());
        Ok(())
    }

    /// 调整长度，扩展部分以`fill`填充
    pub fn resize(&mut self, new_length: usize, fill: u8) {
        self.data.resize(new_length, fill);
    }

    /// 清空内容
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// 正向查找模式串
    ///
    /// 返回从`from`起、`before`之前（若给出）的第一个匹配起始偏移。
    /// 空模式串视为未找到。
    pub fn find(&self, pattern: &[u8], from: usize, before: Option<usize>) -> Option<usize> {
        if pattern.is_empty() || pattern.len() > self.data.len() {
            return None;
        }

        let limit = before.unwrap_or(self.data.len()).min(self.data.len());
        let last_start = self.data.len() - pattern.len();

        for offset in from..=last_start {
            if offset >= limit {
                break;
            }
            if self.data[offset..offset + pattern.len()] == *pattern {
                return Some(offset);
            }
        }
        None
    }

    /// 反向查找模式串
    ///
    /// 从`from`（默认末尾）向前查找，返回最后一个匹配的起始偏移。
    /// 用于定位尾部结构（如文件末尾的标签页脚），避免全量正向扫描。
    pub fn rfind(&self, pattern: &[u8], from: Option<usize>) -> Option<usize> {
        if pattern.is_empty() || pattern.len() > self.data.len() {
            return None;
        }

        let last_start = self.data.len() - pattern.len();
        let upper = from.unwrap_or(last_start).min(last_start);

        for offset in (0..=upper).rev() {
            if self.data[offset..offset + pattern.len()] == *pattern {
                return Some(offset);
            }
        }
        None
    }

    /// 是否以模式串开头
    pub fn starts_with(&self, pattern: &[u8]) -> bool {
        self.data.starts_with(pattern)
    }

    /// 是否以模式串结尾
    pub fn ends_with(&self, pattern: &[u8]) -> bool {
        self.data.ends_with(pattern)
    }

    /// 指定偏移处是否恰好为模式串
    pub fn contains_at(&self, pattern: &[u8], offset: usize) -> bool {
        match self.data.get(offset..) {
            Some(rest) => rest.starts_with(pattern),
            None => false,
        }
    }

    /// 截取子区间为新缓冲区
    ///
    /// 越界的offset得到空缓冲区，越界的length截断到可用字节，
    /// 永不报错。
    pub fn mid(&self, offset: usize, length: Option<usize>) -> ByteVector {
        if offset >= self.data.len() {
            return ByteVector::new();
        }
        let available = self.data.len() - offset;
        let take = length.unwrap_or(available).min(available);
        ByteVector::from_slice(&self.data[offset..offset + take])
    }

    // ---- 定宽数值编解码 ----

    /// 由u16构造2字节缓冲区
    pub fn from_u16(value: u16, endian: Endianness) -> Self {
        let mut buffer = [0u8; 2];
        match endian {
            Endianness::Little => LittleEndian::write_u16(&mut buffer, value),
            Endianness::Big => BigEndian::write_u16(&mut buffer, value),
        }
        ByteVector::from_slice(&buffer)
    }

    /// 由u32构造4字节缓冲区
    pub fn from_u32(value: u32, endian: Endianness) -> Self {
        let mut buffer = [0u8; 4];
        match endian {
            Endianness::Little => LittleEndian::write_u32(&mut buffer, value),
            Endianness::Big => BigEndian::write_u32(&mut buffer, value),
        }
        ByteVector::from_slice(&buffer)
    }

    /// 由i32构造4字节缓冲区
    pub fn from_i32(value: i32, endian: Endianness) -> Self {
        let mut buffer = [0u8; 4];
        match endian {
            Endianness::Little => LittleEndian::write_i32(&mut buffer, value),
            Endianness::Big => BigEndian::write_i32(&mut buffer, value),
        }
        ByteVector::from_slice(&buffer)
    }

    /// 由u64构造8字节缓冲区
    pub fn from_u64(value: u64, endian: Endianness) -> Self {
        let mut buffer = [0u8; 8];
        match endian {
            Endianness::Little => LittleEndian::write_u64(&mut buffer, value),
            Endianness::Big => BigEndian::write_u64(&mut buffer, value),
        }
        ByteVector::from_slice(&buffer)
    }

    /// 由i64构造8字节缓冲区
    pub fn from_i64(value: i64, endian: Endianness) -> Self {
        let mut buffer = [0u8; 8];
        match endian {
            Endianness::Little => LittleEndian::write_i64(&mut buffer, value),
            Endianness::Big => BigEndian::write_i64(&mut buffer, value),
        }
        ByteVector::from_slice(&buffer)
    }

    fn numeric_slice(&self, offset: usize, width: usize) -> Result<&[u8], TagError> {
        self.data.get(offset..offset + width).ok_or_else(|| {
            TagError::FormatError(format!(
                "need {} bytes at offset {} (length {})",
                width,
                offset,
                self.data.len()
            ))
        })
    }

    /// 从指定偏移读取u16（字节不足报格式错误）
    pub fn to_u16(&self, offset: usize, endian: Endianness) -> Result<u16, TagError> {
        let slice = self.numeric_slice(offset, 2)?;
        Ok(match endian {
            Endianness::Little => LittleEndian::read_u16(slice),
            Endianness::Big => BigEndian::read_u16(slice),
        })
    }

    /// 从指定偏移读取u32
    pub fn to_u32(&self, offset: usize, endian: Endianness) -> Result<u32, TagError> {
        let slice = self.numeric_slice(offset, 4)?;
        Ok(match endian {
            Endianness::Little => LittleEndian::read_u32(slice),
            Endianness::Big => BigEndian::read_u32(slice),
        })
    }

    /// 从指定偏移读取i32
    pub fn to_i32(&self, offset: usize, endian: Endianness) -> Result<i32, TagError> {
        let slice = self.numeric_slice(offset, 4)?;
        Ok(match endian {
            Endianness::Little => LittleEndian::read_i32(slice),
            Endianness::Big => BigEndian::read_i32(slice),
        })
    }

    /// 从指定偏移读取u64
    pub fn to_u64(&self, offset: usize, endian: Endianness) -> Result<u64, TagError> {
        let slice = self.numeric_slice(offset, 8)?;
        Ok(match endian {
            Endianness::Little => LittleEndian::read_u64(slice),
            Endianness::Big => BigEndian::read_u64(slice),
        })
    }

    /// 从指定偏移读取i64
    pub fn to_i64(&self, offset: usize, endian: Endianness) -> Result<i64, TagError> {
        let slice = self.numeric_slice(offset, 8)?;
        Ok(match endian {
            Endianness::Little => LittleEndian::read_i64(slice),
            Endianness::Big => BigEndian::read_i64(slice),
        })
    }

    // ---- 字符串编解码 ----

    /// 由字符串构造缓冲区
    pub fn from_string(text: &str, encoding: StringEncoding) -> Self {
        ByteVector {
            data: encoding.encode(text),
        }
    }

    /// 解码指定区间为字符串
    ///
    /// 区间越界按可用字节截断（与`mid`相同的宽容策略）。
    pub fn to_text(&self, encoding: StringEncoding, offset: usize, length: Option<usize>) -> String {
        encoding.decode(self.mid(offset, length).as_slice())
    }

    /// 解码为多个NUL分隔的字符串
    ///
    /// 分隔单元宽度取决于编码（单字节编码1字节，UTF-16族2字节）。
    /// 末尾的不完整单元与垃圾字节被忽略，返回已完整解析的字符串。
    pub fn to_texts(&self, encoding: StringEncoding, offset: usize) -> Vec<String> {
        let data = match self.data.get(offset..) {
            Some(rest) => rest,
            None => return Vec::new(),
        };

        let width = encoding.code_unit_width();
        let usable = data.len() - data.len() % width;

        let mut strings = Vec::new();
        let mut run_start = 0;
        let mut position = 0;
        while position + width <= usable {
            let is_nul = data[position..position + width].iter().all(|&b| b == 0);
            if is_nul {
                strings.push(encoding.decode(&data[run_start..position]));
                run_start = position + width;
            }
            position += width;
        }
        // 最后一段没有NUL结尾也算完整字符串
        if run_start < usable {
            strings.push(encoding.decode(&data[run_start..usable]));
        }
        strings
    }

    /// 计算内容的CRC32校验和
    ///
    /// 用于检测数据意外损坏，不提供密码学保证。
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.data)
    }
}

impl From<Vec<u8>> for ByteVector {
    fn from(data: Vec<u8>) -> Self {
        ByteVector { data }
    }
}

impl From<&[u8]> for ByteVector {
    fn from(data: &[u8]) -> Self {
        ByteVector::from_slice(data)
    }
}

impl AsRef<[u8]> for ByteVector {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet() -> ByteVector {
        ByteVector::from_slice(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ")
    }

    #[test]
    fn test_find_basic() {
        let buffer = alphabet();
        assert_eq!(buffer.find(b"RSTUV", 0, None), Some(17));
        assert_eq!(buffer.find(b"A", 0, None), Some(0));
        assert_eq!(buffer.find(b"Z", 0, None), Some(25));
        assert_eq!(buffer.find(b"AZ", 0, None), None);
    }

    #[test]
    fn test_find_bounds() {
        let buffer = ByteVector::from_slice(b"abcabcabc");
        assert_eq!(buffer.find(b"abc", 1, None), Some(3));
        assert_eq!(buffer.find(b"abc", 4, None), Some(6));
        // before限制匹配起始位置
        assert_eq!(buffer.find(b"abc", 1, Some(3)), None);
        assert_eq!(buffer.find(b"abc", 0, Some(1)), Some(0));
    }

    #[test]
    fn test_find_empty_pattern() {
        let buffer = alphabet();
        assert_eq!(buffer.find(b"", 0, None), None);
        assert_eq!(buffer.rfind(b"", None), None);
    }

    #[test]
    fn test_rfind() {
        let buffer = alphabet();
        assert_eq!(buffer.rfind(b"GHIJ", None), Some(6));

        let repeated = ByteVector::from_slice(b"abcabcabc");
        assert_eq!(repeated.rfind(b"abc", None), Some(6));
        assert_eq!(repeated.rfind(b"abc", Some(5)), Some(3));
        assert_eq!(repeated.rfind(b"abc", Some(0)), Some(0));
    }

    #[test]
    fn test_mid() {
        let buffer = alphabet();
        assert_eq!(buffer.mid(15, Some(6)).as_slice(), b"PQRSTU");
        // 越界长度截断
        assert_eq!(buffer.mid(24, Some(100)).as_slice(), b"YZ");
        // 越界偏移得到空缓冲区
        assert!(buffer.mid(100, Some(5)).is_empty());
        // 缺省长度取到末尾
        assert_eq!(buffer.mid(23, None).as_slice(), b"XYZ");
    }

    #[test]
    fn test_anchored_matches() {
        let buffer = alphabet();
        assert!(buffer.starts_with(b"ABC"));
        assert!(!buffer.starts_with(b"BCD"));
        assert!(buffer.ends_with(b"XYZ"));
        assert!(buffer.contains_at(b"MNO", 12));
        assert!(!buffer.contains_at(b"MNO", 11));
        assert!(!buffer.contains_at(b"YZ!", 24));
    }

    #[test]
    fn test_at_bounds_checked() {
        let buffer = ByteVector::from_slice(b"xy");
        assert_eq!(buffer.at(0).unwrap(), b'x');
        assert_eq!(buffer.at(1).unwrap(), b'y');
        assert!(matches!(buffer.at(2), Err(TagError::OutOfRange(_))));
    }

    #[test]
    fn test_mutation() {
        let mut buffer = ByteVector::new();
        buffer.append(b"head");
        buffer.append(b"tail");
        assert_eq!(buffer.as_slice(), b"headtail");

        buffer.insert(4, b"-mid-").unwrap();
        assert_eq!(buffer.as_slice(), b"head-mid-tail");

        assert!(buffer.insert(100, b"x").is_err());
        // 失败的插入不应改变内容
        assert_eq!(buffer.as_slice(), b"head-mid-tail");

        buffer.resize(4, 0);
        assert_eq!(buffer.as_slice(), b"head");
        buffer.resize(6, b'!');
        assert_eq!(buffer.as_slice(), b"head!!");

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_numeric_roundtrip() {
        for endian in [Endianness::Little, Endianness::Big] {
            assert_eq!(
                ByteVector::from_u16(0xBEEF, endian)
                    .to_u16(0, endian)
                    .unwrap(),
                0xBEEF
            );
            assert_eq!(
                ByteVector::from_u32(0xDEADBEEF, endian)
                    .to_u32(0, endian)
                    .unwrap(),
                0xDEADBEEF
            );
            assert_eq!(
                ByteVector::from_i32(-123456789, endian)
                    .to_i32(0, endian)
                    .unwrap(),
                -123456789
            );
            assert_eq!(
                ByteVector::from_u64(0x0123456789ABCDEF, endian)
                    .to_u64(0, endian)
                    .unwrap(),
                0x0123456789ABCDEF
            );
            assert_eq!(
                ByteVector::from_i64(i64::MIN, endian)
                    .to_i64(0, endian)
                    .unwrap(),
                i64::MIN
            );
        }
    }

    #[test]
    fn test_numeric_endianness_layout() {
        assert_eq!(
            ByteVector::from_u32(0x01020304, Endianness::Big).as_slice(),
            &[0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(
            ByteVector::from_u32(0x01020304, Endianness::Little).as_slice(),
            &[0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_numeric_short_slice() {
        let buffer = ByteVector::from_slice(&[0x01, 0x02]);
        assert!(matches!(
            buffer.to_u32(0, Endianness::Little),
            Err(TagError::FormatError(_))
        ));
        assert!(matches!(
            buffer.to_u16(1, Endianness::Little),
            Err(TagError::FormatError(_))
        ));
        assert_eq!(buffer.to_u16(0, Endianness::Big).unwrap(), 0x0102);
    }

    #[test]
    fn test_string_roundtrip() {
        let buffer = ByteVector::from_string("Night Drive", StringEncoding::Latin1);
        assert_eq!(
            buffer.to_text(StringEncoding::Latin1, 0, None),
            "Night Drive"
        );

        let buffer = ByteVector::from_string("铁剑", StringEncoding::Utf16);
        assert_eq!(buffer.to_text(StringEncoding::Utf16, 0, None), "铁剑");
    }

    #[test]
    fn test_to_texts_single_byte() {
        let mut buffer = ByteVector::from_string("Rock", StringEncoding::Utf8);
        buffer.append(&[0]);
        buffer.append(b"Jazz");
        buffer.append(&[0]);
        buffer.append(b"Blues");

        let strings = buffer.to_texts(StringEncoding::Utf8, 0);
        assert_eq!(strings, vec!["Rock", "Jazz", "Blues"]);
    }

    #[test]
    fn test_to_texts_wide_with_garbage() {
        let mut buffer = ByteVector::new();
        buffer.append(&StringEncoding::Utf16Le.encode("One"));
        buffer.append(&[0, 0]);
        buffer.append(&StringEncoding::Utf16Le.encode("Two"));
        // 末尾的不完整编码单元应被忽略
        buffer.append(&[0x41]);

        let strings = buffer.to_texts(StringEncoding::Utf16Le, 0);
        assert_eq!(strings, vec!["One", "Two"]);
    }

    #[test]
    fn test_checksum_known_value() {
        let buffer = ByteVector::from_slice(b"123456789");
        assert_eq!(buffer.checksum(), 0xCBF43926);
    }

    #[test]
    fn test_ordering() {
        let a = ByteVector::from_slice(b"abc");
        let b = ByteVector::from_slice(b"abd");
        let c = ByteVector::from_slice(b"abcd");
        assert!(a < b);
        assert!(a < c);
        assert_eq!(a, ByteVector::from_slice(b"abc"));
    }

    /// 规格场景：在缓冲区任意位置插入模式串后find/rfind的边界性质
    #[test]
    fn test_insert_then_find_property() {
        let base = ByteVector::from_slice(b"xxxxxxxxxxxxxxxxxxxx");
        let pattern = b"NEEDLE";
        for k in [0usize, 5, 10, 20] {
            let mut buffer = base.clone();
            buffer.insert(k, pattern).unwrap();
            let found = buffer.find(pattern, 0, None).unwrap();
            assert!(found <= k);
            let rfound = buffer.rfind(pattern, None).unwrap();
            assert!(rfound >= k);
        }
    }
}
