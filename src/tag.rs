use serde::{Deserialize, Serialize};

use crate::byte_vector::ByteVector;
use crate::utils::TagError;

/// 标签格式类型
///
/// 排序即读取优先级：现代格式在前，遗留格式在后。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Ape,
    Id3v1,
}

impl TagType {
    /// 人类可读的格式名称
    pub fn description(&self) -> &'static str {
        match self {
            TagType::Ape => "APEv2",
            TagType::Id3v1 => "ID3v1",
        }
    }
}

/// 内嵌图片（封面等）
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    /// MIME类型（如"image/jpeg"）
    pub mime_type: String,
    /// 描述文本
    pub description: String,
    /// 图片原始字节
    pub data: ByteVector,
}

/// 具体标签的字段契约
///
/// 每种标签格式实现一份。多值字段以拥有所有权的集合返回
/// （调用方得到副本），修改必须通过显式的set调用。
/// 无法表示某字段的格式在对应setter上返回`Unsupported`，
/// 聚合层据此跳过该标签继续扇出。
pub trait Tag {
    /// 标签格式
    fn tag_type(&self) -> TagType;

    fn title(&self) -> Option<String>;
    fn set_title(&mut self, title: Option<String>) -> Result<(), TagError>;

    fn album(&self) -> Option<String>;
    fn set_album(&mut self, album: Option<String>) -> Result<(), TagError>;

    /// 表演者（主艺术家）列表
    fn performers(&self) -> Vec<String>;
    fn set_performers(&mut self, performers: Vec<String>) -> Result<(), TagError>;

    fn composers(&self) -> Vec<String>;
    fn set_composers(&mut self, composers: Vec<String>) -> Result<(), TagError>;

    fn genres(&self) -> Vec<String>;
    fn set_genres(&mut self, genres: Vec<String>) -> Result<(), TagError>;

    fn track(&self) -> Option<u32>;
    fn set_track(&mut self, track: Option<u32>) -> Result<(), TagError>;

    fn track_count(&self) -> Option<u32>;
    fn set_track_count(&mut self, count: Option<u32>) -> Result<(), TagError>;

    fn disc(&self) -> Option<u32>;
    fn set_disc(&mut self, disc: Option<u32>) -> Result<(), TagError>;

    fn disc_count(&self) -> Option<u32>;
    fn set_disc_count(&mut self, count: Option<u32>) -> Result<(), TagError>;

    fn year(&self) -> Option<u32>;
    fn set_year(&mut self, year: Option<u32>) -> Result<(), TagError>;

    fn comment(&self) -> Option<String>;
    fn set_comment(&mut self, comment: Option<String>) -> Result<(), TagError>;

    fn copyright(&self) -> Option<String>;
    fn set_copyright(&mut self, copyright: Option<String>) -> Result<(), TagError>;

    fn pictures(&self) -> Vec<Picture>;
    fn set_pictures(&mut self, pictures: Vec<Picture>) -> Result<(), TagError>;

    /// 所有字段是否均为空
    ///
    /// 编解码器据此决定保存时是否整体省略该标签结构。
    fn is_empty(&self) -> bool;

    /// 清空所有字段
    fn clear(&mut self);
}

/// 标签数据快照
///
/// 字段集合的纯数据表示，用于JSON导出/导入与批量处理。
/// 图片等二进制负载不参与快照。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl TagData {
    /// 从单个具体标签采集快照
    pub fn from_tag(tag: &dyn Tag) -> Self {
        TagData {
            title: tag.title(),
            album: tag.album(),
            performers: tag.performers(),
            composers: tag.composers(),
            genres: tag.genres(),
            track: tag.track(),
            track_count: tag.track_count(),
            disc: tag.disc(),
            disc_count: tag.disc_count(),
            year: tag.year(),
            comment: tag.comment(),
            copyright: tag.copyright(),
        }
    }

    /// 快照是否不含任何字段
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.album.is_none()
            && self.performers.is_empty()
            && self.composers.is_empty()
            && self.genres.is_empty()
            && self.track.is_none()
            && self.track_count.is_none()
            && self.disc.is_none()
            && self.disc_count.is_none()
            && self.year.is_none()
            && self.comment.is_none()
            && self.copyright.is_none()
    }
}
