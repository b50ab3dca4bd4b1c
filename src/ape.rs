use bitflags::bitflags;
use std::io::Cursor;

use crate::byte_vector::ByteVector;
use crate::datatypes::{read_u32, Endianness, StringEncoding};
use crate::editor::FileEditor;
use crate::tag::{Picture, Tag, TagType};
use crate::utils::TagError;

pub const APE_PREAMBLE: &[u8; 8] = b"APETAGEX";
pub const APE_VERSION: u32 = 2000;
/// 页脚（与页眉）的固定长度
pub const FOOTER_SIZE: usize = 32;

bitflags! {
    /// 标签级标志位（位于页眉/页脚的flags字段）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApeTagFlags: u32 {
        const CONTAINS_HEADER = 0x8000_0000;
        const CONTAINS_NO_FOOTER = 0x4000_0000;
        const IS_HEADER = 0x2000_0000;
    }
}

// 条目级标志位
const ITEM_READ_ONLY: u32 = 0x1;
const ITEM_TYPE_SHIFT: u32 = 1;
const ITEM_TYPE_MASK: u32 = 0x3;
const ITEM_TYPE_BINARY: u32 = 1;

/// 封面条目的约定键名
const COVER_ART_KEY: &str = "Cover Art (Front)";

/// APE条目的值
///
/// 文本条目可含多个以NUL分隔的值；二进制条目用于封面等负载。
/// 外部定位器类型按文本处理。
#[derive(Debug, Clone, PartialEq)]
pub enum ApeItemValue {
    Text(Vec<String>),
    Binary(ByteVector),
}

/// APE标签条目
#[derive(Debug, Clone, PartialEq)]
pub struct ApeItem {
    /// 键名（ASCII，查找时不区分大小写）
    pub key: String,
    pub value: ApeItemValue,
    pub read_only: bool,
}

/// APEv2标签定位信息
///
/// 文件内的标签区间与条目区间，strip与重写都以此为准。
#[derive(Debug, Clone, Copy)]
pub struct ApeTagLocation {
    /// 整个标签（含页眉，若有）的起始偏移
    pub start: u64,
    /// 整个标签的总长度
    pub length: u64,
    /// 条目区的起始偏移
    pub items_start: u64,
    /// 条目区长度
    pub items_length: u64,
    /// 条目数
    pub item_count: u32,
}

/// APEv2标签
///
/// 可变长度的现代格式：UTF-8文本、任意键、多值、二进制条目。
/// 位于文件末尾（若同时存在ID3v1，则在其之前），重写时的长度差
/// 由文件编辑器的块替换吸收。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApeTag {
    items: Vec<ApeItem>,
}

impl ApeTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 条目列表（按文件内顺序）
    pub fn items(&self) -> &[ApeItem] {
        &self.items
    }

    /// 按键查找条目（不区分大小写）
    pub fn item(&self, key: &str) -> Option<&ApeItem> {
        self.items.iter().find(|i| i.key.eq_ignore_ascii_case(key))
    }

    /// 取文本条目的所有值
    pub fn texts(&self, key: &str) -> Vec<String> {
        match self.item(key) {
            Some(ApeItem {
                value: ApeItemValue::Text(values),
                ..
            }) => values.clone(),
            _ => Vec::new(),
        }
    }

    /// 取文本条目的第一个值
    pub fn first_text(&self, key: &str) -> Option<String> {
        self.texts(key).into_iter().next()
    }

    /// 写入多值文本条目（空列表等价于删除）
    pub fn set_texts(&mut self, key: &str, values: Vec<String>) {
        if values.is_empty() {
            self.remove_item(key);
            return;
        }
        match self
            .items
            .iter_mut()
            .find(|i| i.key.eq_ignore_ascii_case(key))
        {
            Some(item) => item.value = ApeItemValue::Text(values),
            None => self.items.push(ApeItem {
                key: key.to_string(),
                value: ApeItemValue::Text(values),
                read_only: false,
            }),
        }
    }

    /// 写入单值文本条目（None等价于删除）
    pub fn set_text(&mut self, key: &str, value: Option<String>) {
        self.set_texts(key, value.into_iter().collect());
    }

    /// 写入二进制条目
    pub fn set_binary(&mut self, key: &str, data: ByteVector) {
        match self
            .items
            .iter_mut()
            .find(|i| i.key.eq_ignore_ascii_case(key))
        {
            Some(item) => item.value = ApeItemValue::Binary(data),
            None => self.items.push(ApeItem {
                key: key.to_string(),
                value: ApeItemValue::Binary(data),
                read_only: false,
            }),
        }
    }

    /// 删除条目（不存在时无害）
    pub fn remove_item(&mut self, key: &str) {
        self.items.retain(|i| !i.key.eq_ignore_ascii_case(key));
    }

    /// 解析条目区
    pub fn parse_items(items_region: &ByteVector, item_count: u32) -> Result<Self, TagError> {
        let data = items_region.as_slice();
        let mut cursor = Cursor::new(data);
        let mut items = Vec::with_capacity(item_count as usize);

        for index in 0..item_count {
            let value_size = read_u32(&mut cursor).map_err(|_| {
                TagError::FormatError(format!("truncated APE item header (item {})", index))
            })? as usize;
            let flags = read_u32(&mut cursor).map_err(|_| {
                TagError::FormatError(format!("truncated APE item header (item {})", index))
            })?;

            // 键名：从当前位置到NUL
            let key_start = cursor.position() as usize;
            let key_end = data[key_start..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| key_start + p)
                .ok_or_else(|| {
                    TagError::FormatError(format!("unterminated APE item key (item {})", index))
                })?;
            let key = std::str::from_utf8(&data[key_start..key_end])
                .map_err(|_| {
                    TagError::FormatError(format!("non-UTF-8 APE item key (item {})", index))
                })?
                .to_string();

            let value_start = key_end + 1;
            let value_end = value_start.checked_add(value_size).ok_or_else(|| {
                TagError::FormatError(format!("APE item size overflow (item {})", index))
            })?;
            if value_end > data.len() {
                return Err(TagError::FormatError(format!(
                    "APE item value exceeds tag bounds (item {}, key {})",
                    index, key
                )));
            }
            let value_bytes = &data[value_start..value_end];
            cursor.set_position(value_end as u64);

            let item_type = (flags >> ITEM_TYPE_SHIFT) & ITEM_TYPE_MASK;
            let value = if item_type == ITEM_TYPE_BINARY {
                ApeItemValue::Binary(ByteVector::from_slice(value_bytes))
            } else {
                ApeItemValue::Text(
                    ByteVector::from_slice(value_bytes).to_texts(StringEncoding::Utf8, 0),
                )
            };

            items.push(ApeItem {
                key,
                value,
                read_only: flags & ITEM_READ_ONLY != 0,
            });
        }

        Ok(ApeTag { items })
    }

    /// 渲染为完整标签（页眉 + 条目 + 页脚）
    pub fn render(&self) -> ByteVector {
        let mut items_data = ByteVector::new();
        for item in &self.items {
            let (value_bytes, type_bits) = match &item.value {
                ApeItemValue::Text(values) => {
                    let joined = values.join("\0");
                    (ByteVector::from_string(&joined, StringEncoding::Utf8), 0)
                }
                ApeItemValue::Binary(data) => (data.clone(), ITEM_TYPE_BINARY),
            };

            let mut flags = type_bits << ITEM_TYPE_SHIFT;
            if item.read_only {
                flags |= ITEM_READ_ONLY;
            }

            items_data.append(
                ByteVector::from_u32(value_bytes.len() as u32, Endianness::Little).as_slice(),
            );
            items_data.append(ByteVector::from_u32(flags, Endianness::Little).as_slice());
            items_data.append(item.key.as_bytes());
            items_data.append(&[0]);
            items_data.append(value_bytes.as_slice());
        }

        // tag size按规范只计条目区与页脚，页眉不算在内
        let tag_size = (items_data.len() + FOOTER_SIZE) as u32;
        let item_count = self.items.len() as u32;

        let mut tag = self.render_boundary(
            tag_size,
            item_count,
            ApeTagFlags::CONTAINS_HEADER | ApeTagFlags::IS_HEADER,
        );
        tag.append(items_data.as_slice());
        tag.append(
            self.render_boundary(tag_size, item_count, ApeTagFlags::CONTAINS_HEADER)
                .as_slice(),
        );
        tag
    }

    fn render_boundary(&self, tag_size: u32, item_count: u32, flags: ApeTagFlags) -> ByteVector {
        let mut boundary = ByteVector::from_slice(APE_PREAMBLE);
        boundary.append(ByteVector::from_u32(APE_VERSION, Endianness::Little).as_slice());
        boundary.append(ByteVector::from_u32(tag_size, Endianness::Little).as_slice());
        boundary.append(ByteVector::from_u32(item_count, Endianness::Little).as_slice());
        boundary.append(ByteVector::from_u32(flags.bits(), Endianness::Little).as_slice());
        boundary.append(&[0u8; 8]);
        boundary
    }

    /// 定位文件中的APE标签
    ///
    /// `before`给出标签区间的排他性上界：与ID3v1共存时传入其起始
    /// 偏移，否则为文件末尾。页脚损坏或区间越界时视为无标签。
    pub fn locate(
        editor: &mut FileEditor,
        before: Option<u64>,
    ) -> Result<Option<ApeTagLocation>, TagError> {
        let end = before.unwrap_or(editor.length()).min(editor.length());
        if end < FOOTER_SIZE as u64 {
            return Ok(None);
        }

        let footer_start = end - FOOTER_SIZE as u64;
        editor.seek(footer_start)?;
        let footer = editor.read_block(FOOTER_SIZE)?;
        if !footer.starts_with(APE_PREAMBLE) {
            return Ok(None);
        }

        let flags =
            ApeTagFlags::from_bits_truncate(footer.to_u32(20, Endianness::Little)?);
        if flags.contains(ApeTagFlags::IS_HEADER) {
            // 末尾出现页眉说明结构异常，按无标签处理
            return Ok(None);
        }

        let tag_size = footer.to_u32(12, Endianness::Little)? as u64;
        let item_count = footer.to_u32(16, Endianness::Little)?;
        if tag_size < FOOTER_SIZE as u64 || tag_size > end {
            #[cfg(debug_assertions)]
            println!("忽略损坏的APE页脚: tag_size={} end={}", tag_size, end);
            return Ok(None);
        }

        let header_size = if flags.contains(ApeTagFlags::CONTAINS_HEADER) {
            FOOTER_SIZE as u64
        } else {
            0
        };
        let total = tag_size + header_size;
        if total > end {
            return Ok(None);
        }

        Ok(Some(ApeTagLocation {
            start: end - total,
            length: total,
            items_start: end - tag_size,
            items_length: tag_size - FOOTER_SIZE as u64,
            item_count,
        }))
    }

    /// 从文件读取标签（不存在时返回None）
    pub fn read_from(
        editor: &mut FileEditor,
        before: Option<u64>,
    ) -> Result<Option<Self>, TagError> {
        match Self::locate(editor, before)? {
            Some(location) => {
                editor.seek(location.items_start)?;
                let items_region = editor.read_block(location.items_length as usize)?;
                Ok(Some(Self::parse_items(&items_region, location.item_count)?))
            }
            None => Ok(None),
        }
    }

    /// 从文件中移除标签，返回是否发生了移除
    pub fn strip(editor: &mut FileEditor, before: Option<u64>) -> Result<bool, TagError> {
        match Self::locate(editor, before)? {
            Some(location) => {
                editor.remove_block(location.start, location.length)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn numeric_pair(&self, key: &str) -> (Option<u32>, Option<u32>) {
        match self.first_text(key) {
            Some(text) => {
                let mut parts = text.splitn(2, '/');
                let first = parts.next().and_then(|p| p.trim().parse().ok());
                let second = parts.next().and_then(|p| p.trim().parse().ok());
                (first, second)
            }
            None => (None, None),
        }
    }

    /// 写入"n"或"n/total"形式的数值对条目
    fn set_numeric_pair(&mut self, key: &str, first: Option<u32>, second: Option<u32>) {
        let text = match (first, second) {
            (Some(n), Some(total)) => Some(format!("{}/{}", n, total)),
            (Some(n), None) => Some(n.to_string()),
            // 只有总数没有序号时仍需保留总数信息
            (None, Some(total)) => Some(format!("0/{}", total)),
            (None, None) => None,
        };
        self.set_text(key, text);
    }

    fn extension_to_mime(name: &str) -> &'static str {
        let lowered = name.to_ascii_lowercase();
        if lowered.ends_with(".png") {
            "image/png"
        } else if lowered.ends_with(".gif") {
            "image/gif"
        } else if lowered.ends_with(".bmp") {
            "image/bmp"
        } else if lowered.ends_with(".jpg") || lowered.ends_with(".jpeg") {
            "image/jpeg"
        } else {
            "application/octet-stream"
        }
    }

    fn mime_to_extension(mime: &str) -> &'static str {
        match mime {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "jpg",
        }
    }
}

impl Tag for ApeTag {
    fn tag_type(&self) -> TagType {
        TagType::Ape
    }

    fn title(&self) -> Option<String> {
        self.first_text("Title")
    }

    fn set_title(&mut self, title: Option<String>) -> Result<(), TagError> {
        self.set_text("Title", title);
        Ok(())
    }

    fn album(&self) -> Option<String> {
        self.first_text("Album")
    }

    fn set_album(&mut self, album: Option<String>) -> Result<(), TagError> {
        self.set_text("Album", album);
        Ok(())
    }

    fn performers(&self) -> Vec<String> {
        self.texts("Artist")
    }

    fn set_performers(&mut self, performers: Vec<String>) -> Result<(), TagError> {
        self.set_texts("Artist", performers);
        Ok(())
    }

    fn composers(&self) -> Vec<String> {
        self.texts("Composer")
    }

    fn set_composers(&mut self, composers: Vec<String>) -> Result<(), TagError> {
        self.set_texts("Composer", composers);
        Ok(())
    }

    fn genres(&self) -> Vec<String> {
        self.texts("Genre")
    }

    fn set_genres(&mut self, genres: Vec<String>) -> Result<(), TagError> {
        self.set_texts("Genre", genres);
        Ok(())
    }

    fn track(&self) -> Option<u32> {
        self.numeric_pair("Track").0.filter(|&n| n != 0)
    }

    fn set_track(&mut self, track: Option<u32>) -> Result<(), TagError> {
        let (_, count) = self.numeric_pair("Track");
        self.set_numeric_pair("Track", track, count);
        Ok(())
    }

    fn track_count(&self) -> Option<u32> {
        self.numeric_pair("Track").1
    }

    fn set_track_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        let (track, _) = self.numeric_pair("Track");
        self.set_numeric_pair("Track", track, count);
        Ok(())
    }

    fn disc(&self) -> Option<u32> {
        self.numeric_pair("Disc").0.filter(|&n| n != 0)
    }

    fn set_disc(&mut self, disc: Option<u32>) -> Result<(), TagError> {
        let (_, count) = self.numeric_pair("Disc");
        self.set_numeric_pair("Disc", disc, count);
        Ok(())
    }

    fn disc_count(&self) -> Option<u32> {
        self.numeric_pair("Disc").1
    }

    fn set_disc_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        let (disc, _) = self.numeric_pair("Disc");
        self.set_numeric_pair("Disc", disc, count);
        Ok(())
    }

    fn year(&self) -> Option<u32> {
        // "2019"或"2019-05-01"都取前导数字
        self.first_text("Year").and_then(|text| {
            let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok().filter(|&y| y != 0)
        })
    }

    fn set_year(&mut self, year: Option<u32>) -> Result<(), TagError> {
        self.set_text("Year", year.map(|y| y.to_string()));
        Ok(())
    }

    fn comment(&self) -> Option<String> {
        self.first_text("Comment")
    }

    fn set_comment(&mut self, comment: Option<String>) -> Result<(), TagError> {
        self.set_text("Comment", comment);
        Ok(())
    }

    fn copyright(&self) -> Option<String> {
        self.first_text("Copyright")
    }

    fn set_copyright(&mut self, copyright: Option<String>) -> Result<(), TagError> {
        self.set_text("Copyright", copyright);
        Ok(())
    }

    fn pictures(&self) -> Vec<Picture> {
        // 约定：二进制值为"文件名 NUL 图片数据"
        match self.item(COVER_ART_KEY) {
            Some(ApeItem {
                value: ApeItemValue::Binary(data),
                ..
            }) => {
                let (description, image) = match data.find(&[0], 0, None) {
                    Some(nul) => (
                        data.to_text(StringEncoding::Utf8, 0, Some(nul)),
                        data.mid(nul + 1, None),
                    ),
                    None => (String::new(), data.clone()),
                };
                vec![Picture {
                    mime_type: Self::extension_to_mime(&description).to_string(),
                    description,
                    data: image,
                }]
            }
            _ => Vec::new(),
        }
    }

    fn set_pictures(&mut self, pictures: Vec<Picture>) -> Result<(), TagError> {
        // APE只有一个正面封面条目，保留第一张
        match pictures.into_iter().next() {
            Some(picture) => {
                let description = if picture.description.is_empty() {
                    format!("cover.{}", Self::mime_to_extension(&picture.mime_type))
                } else {
                    picture.description
                };
                let mut value = ByteVector::from_string(&description, StringEncoding::Utf8);
                value.append(&[0]);
                value.append(picture.data.as_slice());
                self.set_binary(COVER_ART_KEY, value);
            }
            None => self.remove_item(COVER_ART_KEY),
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn sample_tag() -> ApeTag {
        let mut tag = ApeTag::new();
        tag.set_text("Title", Some("Night Drive".to_string()));
        tag.set_texts(
            "Artist",
            vec!["The Editors".to_string(), "Guest Singer".to_string()],
        );
        tag.set_text("Album", Some("City Lights".to_string()));
        tag.set_text("Year", Some("2019".to_string()));
        tag.set_text("Track", Some("3/12".to_string()));
        tag
    }

    fn editor_over(data: Vec<u8>) -> FileEditor {
        FileEditor::with_buffer_size(Box::new(MemoryStream::new("<memory>", data)), 64).unwrap()
    }

    #[test]
    fn test_item_accessors() {
        let tag = sample_tag();
        assert_eq!(tag.first_text("title").as_deref(), Some("Night Drive"));
        assert_eq!(tag.texts("ARTIST"), vec!["The Editors", "Guest Singer"]);
        assert!(tag.item("Missing").is_none());
    }

    #[test]
    fn test_set_texts_empty_removes() {
        let mut tag = sample_tag();
        tag.set_texts("Artist", Vec::new());
        assert!(tag.item("Artist").is_none());

        tag.set_text("Title", None);
        assert!(tag.item("Title").is_none());

        // 删除不存在的条目无害
        tag.remove_item("Nonexistent");
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let tag = sample_tag();
        let rendered = tag.render();

        // 页眉与页脚各32字节
        assert!(rendered.starts_with(APE_PREAMBLE));
        assert!(rendered.mid(rendered.len() - FOOTER_SIZE, None).starts_with(APE_PREAMBLE));

        let tag_size = rendered
            .to_u32(rendered.len() - FOOTER_SIZE + 12, Endianness::Little)
            .unwrap() as usize;
        assert_eq!(tag_size + FOOTER_SIZE, rendered.len());

        let items_region = rendered.mid(FOOTER_SIZE, Some(rendered.len() - 2 * FOOTER_SIZE));
        let parsed = ApeTag::parse_items(&items_region, tag.items().len() as u32).unwrap();
        assert_eq!(parsed, tag);
    }

    #[test]
    fn test_parse_truncated_items_fails() {
        let tag = sample_tag();
        let rendered = tag.render();
        let items_region = rendered.mid(FOOTER_SIZE, Some(10));
        assert!(matches!(
            ApeTag::parse_items(&items_region, 5),
            Err(TagError::FormatError(_))
        ));
    }

    #[test]
    fn test_locate_and_read_from_file() {
        let mut data = b"fake-audio-payload".to_vec();
        data.extend_from_slice(sample_tag().render().as_slice());

        let mut editor = editor_over(data);
        let location = ApeTag::locate(&mut editor, None).unwrap().unwrap();
        assert_eq!(location.start, 18);
        assert_eq!(location.start + location.length, editor.length());
        assert_eq!(location.item_count, 5);

        let tag = ApeTag::read_from(&mut editor, None).unwrap().unwrap();
        assert_eq!(tag.first_text("Title").as_deref(), Some("Night Drive"));
    }

    #[test]
    fn test_locate_absent() {
        let mut editor = editor_over(b"no tags in this payload whatsoever".to_vec());
        assert!(ApeTag::locate(&mut editor, None).unwrap().is_none());
    }

    #[test]
    fn test_strip() {
        let payload = b"fake-audio-payload".to_vec();
        let mut data = payload.clone();
        data.extend_from_slice(sample_tag().render().as_slice());

        let mut editor = editor_over(data);
        assert!(ApeTag::strip(&mut editor, None).unwrap());
        assert_eq!(editor.length(), payload.len() as u64);
        assert!(!ApeTag::strip(&mut editor, None).unwrap());
    }

    #[test]
    fn test_track_pair() {
        let mut tag = ApeTag::new();
        tag.set_track(Some(3)).unwrap();
        assert_eq!(tag.first_text("Track").as_deref(), Some("3"));

        tag.set_track_count(Some(12)).unwrap();
        assert_eq!(tag.first_text("Track").as_deref(), Some("3/12"));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.track_count(), Some(12));

        tag.set_track(None).unwrap();
        assert_eq!(tag.first_text("Track").as_deref(), Some("0/12"));
        assert_eq!(tag.track(), None);
    }

    #[test]
    fn test_year_with_full_date() {
        let mut tag = ApeTag::new();
        tag.set_text("Year", Some("2019-05-01".to_string()));
        assert_eq!(tag.year(), Some(2019));
    }

    #[test]
    fn test_pictures_roundtrip() {
        let mut tag = ApeTag::new();
        let picture = Picture {
            mime_type: "image/png".to_string(),
            description: String::new(),
            data: ByteVector::from_slice(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]),
        };
        tag.set_pictures(vec![picture.clone()]).unwrap();

        let read_back = tag.pictures();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].mime_type, "image/png");
        assert_eq!(read_back[0].description, "cover.png");
        assert_eq!(read_back[0].data, picture.data);

        // 渲染再解析后二进制负载保持不变
        let rendered = tag.render();
        let items_region = rendered.mid(FOOTER_SIZE, Some(rendered.len() - 2 * FOOTER_SIZE));
        let parsed = ApeTag::parse_items(&items_region, 1).unwrap();
        assert_eq!(parsed.pictures()[0].data, picture.data);

        tag.set_pictures(Vec::new()).unwrap();
        assert!(tag.pictures().is_empty());
    }

    #[test]
    fn test_read_only_flag_roundtrip() {
        let mut tag = ApeTag::new();
        tag.set_text("Title", Some("Locked".to_string()));
        // 手工置位只读标志
        let mut items = tag.items.clone();
        items[0].read_only = true;
        let tag = ApeTag { items };

        let rendered = tag.render();
        let items_region = rendered.mid(FOOTER_SIZE, Some(rendered.len() - 2 * FOOTER_SIZE));
        let parsed = ApeTag::parse_items(&items_region, 1).unwrap();
        assert!(parsed.items()[0].read_only);
    }

    #[test]
    fn test_is_empty_and_clear() {
        let mut tag = sample_tag();
        assert!(!tag.is_empty());
        tag.clear();
        assert!(tag.is_empty());
    }
}
