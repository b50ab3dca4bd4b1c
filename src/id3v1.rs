use crate::byte_vector::ByteVector;
use crate::datatypes::StringEncoding;
use crate::editor::FileEditor;
use crate::tag::{Picture, Tag, TagType};
use crate::utils::TagError;

/// ID3v1标签总长度（固定位于文件末尾）
pub const TAG_SIZE: usize = 128;

const TAG_IDENTIFIER: &[u8; 3] = b"TAG";

/// ID3v1标准流派表
pub const GENRES: [&str; 80] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge",
    "Hip-Hop", "Jazz", "Metal", "New Age", "Oldies", "Other", "Pop", "R&B",
    "Rap", "Reggae", "Rock", "Techno", "Industrial", "Alternative", "Ska",
    "Death Metal", "Pranks", "Soundtrack", "Euro-Techno", "Ambient",
    "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical",
    "Instrumental", "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise",
    "Alternative Rock", "Bass", "Soul", "Punk", "Space", "Meditative",
    "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic", "Darkwave",
    "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap",
    "Pop/Funk", "Jungle", "Native American", "Cabaret", "New Wave",
    "Psychadelic", "Rave", "Showtunes", "Trailer", "Lo-Fi", "Tribal",
    "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll",
    "Hard Rock",
];

/// 无流派的哨兵索引
const GENRE_NONE: u8 = 255;

/// ID3v1/1.1标签
///
/// 固定128字节、Latin-1编码、NUL或空格填充的遗留格式。
/// 字段宽度受限（标题/艺术家/专辑各30字节），超长内容在保存时截断。
#[derive(Debug, Clone, PartialEq)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub comment: String,
    /// ID3v1.1扩展：注释缩短至28字节换取音轨号
    pub track: Option<u8>,
    pub genre_index: u8,
}

impl Default for Id3v1Tag {
    fn default() -> Self {
        Id3v1Tag {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            year: None,
            comment: String::new(),
            track: None,
            genre_index: GENRE_NONE,
        }
    }
}

impl Id3v1Tag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从128字节块解析标签
    ///
    /// 块不以"TAG"开头时返回None（不是错误——文件没有这种标签而已）。
    pub fn parse(block: &ByteVector) -> Option<Self> {
        if block.len() < TAG_SIZE || !block.starts_with(TAG_IDENTIFIER) {
            return None;
        }

        let title = Self::parse_field(block, 3, 30);
        let artist = Self::parse_field(block, 33, 30);
        let album = Self::parse_field(block, 63, 30);

        let year_text = Self::parse_field(block, 93, 4);
        let year = year_text.parse::<u32>().ok().filter(|&y| y != 0);

        // ID3v1.1：第125字节为NUL且第126字节非零时，该字节是音轨号
        let track_marker = block.at(125).ok()?;
        let track_byte = block.at(126).ok()?;
        let (comment, track) = if track_marker == 0 && track_byte != 0 {
            (Self::parse_field(block, 97, 28), Some(track_byte))
        } else {
            (Self::parse_field(block, 97, 30), None)
        };

        let genre_index = block.at(127).ok()?;

        Some(Id3v1Tag {
            title,
            artist,
            album,
            year,
            comment,
            track,
            genre_index,
        })
    }

    /// 解析定宽字段：取首个NUL之前的内容并去除两端空白
    fn parse_field(block: &ByteVector, offset: usize, width: usize) -> String {
        let field = block.mid(offset, Some(width));
        let end = field
            .as_slice()
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(field.len());
        field.to_text(StringEncoding::Latin1, 0, Some(end)).trim().to_string()
    }

    /// 渲染为128字节块
    pub fn render(&self) -> ByteVector {
        let mut block = ByteVector::from_slice(TAG_IDENTIFIER);
        block.append(Self::fixed_field(&self.title, 30).as_slice());
        block.append(Self::fixed_field(&self.artist, 30).as_slice());
        block.append(Self::fixed_field(&self.album, 30).as_slice());

        let year_text = match self.year {
            Some(year) => format!("{:04}", year.min(9999)),
            None => String::new(),
        };
        block.append(Self::fixed_field(&year_text, 4).as_slice());

        match self.track {
            Some(track) => {
                block.append(Self::fixed_field(&self.comment, 28).as_slice());
                block.append(&[0, track]);
            }
            None => {
                block.append(Self::fixed_field(&self.comment, 30).as_slice());
            }
        }

        block.append(&[self.genre_index]);
        debug_assert_eq!(block.len(), TAG_SIZE);
        block
    }

    /// 编码定宽字段：Latin-1编码后截断或NUL填充到指定宽度
    fn fixed_field(text: &str, width: usize) -> ByteVector {
        let mut field = ByteVector::from_string(text, StringEncoding::Latin1);
        field.resize(width, 0);
        field
    }

    /// 定位文件末尾的ID3v1标签，返回其起始偏移
    pub fn locate(editor: &mut FileEditor) -> Result<Option<u64>, TagError> {
        if editor.length() < TAG_SIZE as u64 {
            return Ok(None);
        }
        let offset = editor.length() - TAG_SIZE as u64;
        editor.seek(offset)?;
        let block = editor.read_block(TAG_SIZE)?;
        if block.starts_with(TAG_IDENTIFIER) {
            Ok(Some(offset))
        } else {
            Ok(None)
        }
    }

    /// 从文件读取标签（不存在时返回None）
    pub fn read_from(editor: &mut FileEditor) -> Result<Option<Self>, TagError> {
        match Self::locate(editor)? {
            Some(offset) => {
                editor.seek(offset)?;
                let block = editor.read_block(TAG_SIZE)?;
                Ok(Self::parse(&block))
            }
            None => Ok(None),
        }
    }

    /// 从文件中移除标签，返回是否发生了移除
    pub fn strip(editor: &mut FileEditor) -> Result<bool, TagError> {
        match Self::locate(editor)? {
            Some(offset) => {
                editor.remove_block(offset, TAG_SIZE as u64)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn genre_name(&self) -> Option<String> {
        GENRES
            .get(self.genre_index as usize)
            .map(|name| name.to_string())
    }

    /// 按名称查找流派索引（不区分大小写），未知名称得到哨兵值
    fn genre_index_for(name: &str) -> u8 {
        GENRES
            .iter()
            .position(|g| g.eq_ignore_ascii_case(name))
            .map(|i| i as u8)
            .unwrap_or(GENRE_NONE)
    }

    fn non_empty(value: &str) -> Option<String> {
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl Tag for Id3v1Tag {
    fn tag_type(&self) -> TagType {
        TagType::Id3v1
    }

    fn title(&self) -> Option<String> {
        Self::non_empty(&self.title)
    }

    fn set_title(&mut self, title: Option<String>) -> Result<(), TagError> {
        self.title = title.unwrap_or_default();
        Ok(())
    }

    fn album(&self) -> Option<String> {
        Self::non_empty(&self.album)
    }

    fn set_album(&mut self, album: Option<String>) -> Result<(), TagError> {
        self.album = album.unwrap_or_default();
        Ok(())
    }

    fn performers(&self) -> Vec<String> {
        Self::non_empty(&self.artist).into_iter().collect()
    }

    fn set_performers(&mut self, performers: Vec<String>) -> Result<(), TagError> {
        // 单值格式：只保留第一个表演者
        self.artist = performers.into_iter().next().unwrap_or_default();
        Ok(())
    }

    fn composers(&self) -> Vec<String> {
        Vec::new()
    }

    fn set_composers(&mut self, composers: Vec<String>) -> Result<(), TagError> {
        if composers.is_empty() {
            Ok(())
        } else {
            Err(TagError::Unsupported(
                "ID3v1 cannot store composers".to_string(),
            ))
        }
    }

    fn genres(&self) -> Vec<String> {
        self.genre_name().into_iter().collect()
    }

    fn set_genres(&mut self, genres: Vec<String>) -> Result<(), TagError> {
        self.genre_index = match genres.first() {
            Some(name) => Self::genre_index_for(name),
            None => GENRE_NONE,
        };
        Ok(())
    }

    fn track(&self) -> Option<u32> {
        self.track.map(u32::from)
    }

    fn set_track(&mut self, track: Option<u32>) -> Result<(), TagError> {
        match track {
            None => {
                self.track = None;
                Ok(())
            }
            Some(value) if value <= u8::MAX as u32 => {
                self.track = Some(value as u8);
                Ok(())
            }
            Some(value) => Err(TagError::Unsupported(format!(
                "track number {} exceeds ID3v1 range",
                value
            ))),
        }
    }

    fn track_count(&self) -> Option<u32> {
        None
    }

    fn set_track_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        match count {
            None => Ok(()),
            Some(_) => Err(TagError::Unsupported(
                "ID3v1 cannot store a track count".to_string(),
            )),
        }
    }

    fn disc(&self) -> Option<u32> {
        None
    }

    fn set_disc(&mut self, disc: Option<u32>) -> Result<(), TagError> {
        match disc {
            None => Ok(()),
            Some(_) => Err(TagError::Unsupported(
                "ID3v1 cannot store a disc number".to_string(),
            )),
        }
    }

    fn disc_count(&self) -> Option<u32> {
        None
    }

    fn set_disc_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        match count {
            None => Ok(()),
            Some(_) => Err(TagError::Unsupported(
                "ID3v1 cannot store a disc count".to_string(),
            )),
        }
    }

    fn year(&self) -> Option<u32> {
        self.year
    }

    fn set_year(&mut self, year: Option<u32>) -> Result<(), TagError> {
        match year {
            Some(value) if value > 9999 => Err(TagError::Unsupported(format!(
                "year {} exceeds ID3v1 range",
                value
            ))),
            other => {
                self.year = other;
                Ok(())
            }
        }
    }

    fn comment(&self) -> Option<String> {
        Self::non_empty(&self.comment)
    }

    fn set_comment(&mut self, comment: Option<String>) -> Result<(), TagError> {
        self.comment = comment.unwrap_or_default();
        Ok(())
    }

    fn copyright(&self) -> Option<String> {
        None
    }

    fn set_copyright(&mut self, copyright: Option<String>) -> Result<(), TagError> {
        match copyright {
            None => Ok(()),
            Some(_) => Err(TagError::Unsupported(
                "ID3v1 cannot store a copyright notice".to_string(),
            )),
        }
    }

    fn pictures(&self) -> Vec<Picture> {
        Vec::new()
    }

    fn set_pictures(&mut self, pictures: Vec<Picture>) -> Result<(), TagError> {
        if pictures.is_empty() {
            Ok(())
        } else {
            Err(TagError::Unsupported(
                "ID3v1 cannot store pictures".to_string(),
            ))
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.artist.is_empty()
            && self.album.is_empty()
            && self.year.is_none()
            && self.comment.is_empty()
            && self.track.is_none()
            && self.genre_index == GENRE_NONE
    }

    fn clear(&mut self) {
        *self = Id3v1Tag::default();
    }
}
