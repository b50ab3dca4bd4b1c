use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::io::{Cursor, Write};

// 基础整数类型读取函数（标签结构内部字段统一使用小端序）
pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, std::io::Error> {
    cursor.read_u8()
}

pub fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, std::io::Error> {
    cursor.read_u16::<LittleEndian>()
}

pub fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, std::io::Error> {
    cursor.read_u32::<LittleEndian>()
}

// 基础整数类型写入函数
pub fn write_u8(writer: &mut dyn Write, value: u8) -> Result<(), std::io::Error> {
    writer.write_u8(value)
}

pub fn write_u16(writer: &mut dyn Write, value: u16) -> Result<(), std::io::Error> {
    writer.write_u16::<LittleEndian>(value)
}

pub fn write_u32(writer: &mut dyn Write, value: u32) -> Result<(), std::io::Error> {
    writer.write_u32::<LittleEndian>(value)
}

/// 字节序
///
/// 标签格式混用两种字节序（如APE使用小端，ID3v2同步安全整数基于大端），
/// 因此数值编解码需要运行时选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// 字符串编码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// 单字节编码（按Windows-1252解码，兼容Latin-1）
    Latin1,
    /// UTF-8
    Utf8,
    /// UTF-16，解码时识别BOM，编码时写入小端BOM
    Utf16,
    /// UTF-16大端（无BOM）
    Utf16Be,
    /// UTF-16小端（无BOM）
    Utf16Le,
}

impl StringEncoding {
    /// 编码单元宽度（字节数），用于按NUL分隔多值字符串
    pub fn code_unit_width(&self) -> usize {
        match self {
            StringEncoding::Latin1 | StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 | StringEncoding::Utf16Be | StringEncoding::Utf16Le => 2,
        }
    }

    /// 按当前编码解码字节序列
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            StringEncoding::Latin1 => WINDOWS_1252.decode(data).0.into_owned(),
            StringEncoding::Utf8 => UTF_8.decode(data).0.into_owned(),
            StringEncoding::Utf16 => {
                // 识别BOM，缺省按小端处理
                if data.len() >= 2 && data[0..2] == [0xFE, 0xFF] {
                    UTF_16BE.decode(&data[2..]).0.into_owned()
                } else if data.len() >= 2 && data[0..2] == [0xFF, 0xFE] {
                    UTF_16LE.decode(&data[2..]).0.into_owned()
                } else {
                    UTF_16LE.decode(data).0.into_owned()
                }
            }
            StringEncoding::Utf16Be => UTF_16BE.decode(data).0.into_owned(),
            StringEncoding::Utf16Le => UTF_16LE.decode(data).0.into_owned(),
        }
    }

    /// 按当前编码编码字符串
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            StringEncoding::Latin1 => WINDOWS_1252.encode(text).0.into_owned(),
            StringEncoding::Utf8 => text.as_bytes().to_vec(),
            StringEncoding::Utf16 => {
                let mut output = vec![0xFF, 0xFE];
                for unit in text.encode_utf16() {
                    output.extend_from_slice(&unit.to_le_bytes());
                }
                output
            }
            StringEncoding::Utf16Be => {
                let mut output = Vec::with_capacity(text.len() * 2);
                for unit in text.encode_utf16() {
                    output.extend_from_slice(&unit.to_be_bytes());
                }
                output
            }
            StringEncoding::Utf16Le => {
                let mut output = Vec::with_capacity(text.len() * 2);
                for unit in text.encode_utf16() {
                    output.extend_from_slice(&unit.to_le_bytes());
                }
                output
            }
        }
    }
}
