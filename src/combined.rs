use crate::ape::ApeTag;
use crate::id3v1::Id3v1Tag;
use crate::tag::{Picture, Tag, TagData, TagType};
use crate::utils::TagError;

/// 多值字段拼接显示时使用的分隔符
const JOIN_SEPARATOR: &str = "; ";

/// 具体标签实例（已知格式的封闭集合）
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteTag {
    Ape(ApeTag),
    Id3v1(Id3v1Tag),
}

impl ConcreteTag {
    /// 以契约trait访问
    pub fn as_tag(&self) -> &dyn Tag {
        match self {
            ConcreteTag::Ape(tag) => tag,
            ConcreteTag::Id3v1(tag) => tag,
        }
    }

    /// 以契约trait可变访问
    pub fn as_tag_mut(&mut self) -> &mut dyn Tag {
        match self {
            ConcreteTag::Ape(tag) => tag,
            ConcreteTag::Id3v1(tag) => tag,
        }
    }

    pub fn tag_type(&self) -> TagType {
        self.as_tag().tag_type()
    }
}

impl From<ApeTag> for ConcreteTag {
    fn from(tag: ApeTag) -> Self {
        ConcreteTag::Ape(tag)
    }
}

impl From<Id3v1Tag> for ConcreteTag {
    fn from(tag: Id3v1Tag) -> Self {
        ConcreteTag::Id3v1(tag)
    }
}

/// 聚合标签视图
///
/// 将零或多个具体标签组合为一个逻辑标签。序列顺序即读取优先级：
/// 标量读取返回顺序中第一个非空值，多值读取返回第一个非空列表。
/// 写入扇出到序列中每个支持该字段的标签，使文件中并存的标签格式
/// 保持一致。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedTag {
    tags: Vec<ConcreteTag>,
}

impl CombinedTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个具体标签（调用方按格式优先级顺序添加）
    pub fn push(&mut self, tag: impl Into<ConcreteTag>) {
        self.tags.push(tag.into());
    }

    /// 按格式优先级插入（`TagType`的排序即优先级）
    pub fn insert_ordered(&mut self, tag: impl Into<ConcreteTag>) {
        let tag = tag.into();
        let position = self
            .tags
            .iter()
            .position(|t| t.tag_type() > tag.tag_type())
            .unwrap_or(self.tags.len());
        self.tags.insert(position, tag);
    }

    /// 序列中的所有具体标签
    pub fn tags(&self) -> &[ConcreteTag] {
        &self.tags
    }

    /// 具体标签数量
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// 是否包含指定格式
    pub fn contains(&self, tag_type: TagType) -> bool {
        self.tags.iter().any(|t| t.tag_type() == tag_type)
    }

    /// 按格式查找
    pub fn tag(&self, tag_type: TagType) -> Option<&ConcreteTag> {
        self.tags.iter().find(|t| t.tag_type() == tag_type)
    }

    /// 按格式可变查找
    pub fn tag_mut(&mut self, tag_type: TagType) -> Option<&mut ConcreteTag> {
        self.tags.iter_mut().find(|t| t.tag_type() == tag_type)
    }

    /// 摘除指定格式的标签
    ///
    /// 其值立即从后续读取中消失；格式不存在时为无害的空操作。
    pub fn remove(&mut self, tag_type: TagType) -> Option<ConcreteTag> {
        self.tags
            .iter()
            .position(|t| t.tag_type() == tag_type)
            .map(|index| self.tags.remove(index))
    }

    fn first_scalar<T>(&self, get: impl Fn(&dyn Tag) -> Option<T>) -> Option<T> {
        self.tags.iter().find_map(|t| get(t.as_tag()))
    }

    fn first_list<T>(&self, get: impl Fn(&dyn Tag) -> Vec<T>) -> Vec<T> {
        for tag in &self.tags {
            let values = get(tag.as_tag());
            if !values.is_empty() {
                return values;
            }
        }
        Vec::new()
    }

    /// 写入扇出
    ///
    /// 对序列中的每个标签尝试写入；`Unsupported`表示该格式不支持
    /// 此字段，跳过即可。其余错误记住第一个，但继续写完剩余标签，
    /// 单个格式的失败不阻塞其他格式。
    fn fan_out(
        &mut self,
        mut apply: impl FnMut(&mut dyn Tag) -> Result<(), TagError>,
    ) -> Result<(), TagError> {
        let mut first_error = None;
        for tag in &mut self.tags {
            match apply(tag.as_tag_mut()) {
                Ok(()) => {}
                Err(TagError::Unsupported(_)) => {}
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // ---- 标量读取（按优先级取第一个非空值） ----

    pub fn title(&self) -> Option<String> {
        self.first_scalar(|t| t.title())
    }

    pub fn album(&self) -> Option<String> {
        self.first_scalar(|t| t.album())
    }

    pub fn comment(&self) -> Option<String> {
        self.first_scalar(|t| t.comment())
    }

    pub fn copyright(&self) -> Option<String> {
        self.first_scalar(|t| t.copyright())
    }

    pub fn year(&self) -> Option<u32> {
        self.first_scalar(|t| t.year())
    }

    pub fn track(&self) -> Option<u32> {
        self.first_scalar(|t| t.track())
    }

    pub fn track_count(&self) -> Option<u32> {
        self.first_scalar(|t| t.track_count())
    }

    pub fn disc(&self) -> Option<u32> {
        self.first_scalar(|t| t.disc())
    }

    pub fn disc_count(&self) -> Option<u32> {
        self.first_scalar(|t| t.disc_count())
    }

    // ---- 多值读取（第一个非空列表，按序回退） ----

    pub fn performers(&self) -> Vec<String> {
        self.first_list(|t| t.performers())
    }

    pub fn composers(&self) -> Vec<String> {
        self.first_list(|t| t.composers())
    }

    pub fn genres(&self) -> Vec<String> {
        self.first_list(|t| t.genres())
    }

    pub fn pictures(&self) -> Vec<Picture> {
        self.first_list(|t| t.pictures())
    }

    // ---- joined访问器（显示用途的单字符串形式） ----

    pub fn joined_performers(&self) -> Option<String> {
        Self::join(self.performers())
    }

    pub fn joined_composers(&self) -> Option<String> {
        Self::join(self.composers())
    }

    pub fn joined_genres(&self) -> Option<String> {
        Self::join(self.genres())
    }

    fn join(values: Vec<String>) -> Option<String> {
        if values.is_empty() {
            None
        } else {
            Some(values.join(JOIN_SEPARATOR))
        }
    }

    // ---- first访问器（单值语义的编解码器使用） ----

    pub fn first_performer(&self) -> Option<String> {
        self.performers().into_iter().next()
    }

    pub fn first_composer(&self) -> Option<String> {
        self.composers().into_iter().next()
    }

    pub fn first_genre(&self) -> Option<String> {
        self.genres().into_iter().next()
    }

    // ---- 写入（扇出到所有支持该字段的标签） ----

    pub fn set_title(&mut self, title: Option<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_title(title.clone()))
    }

    pub fn set_album(&mut self, album: Option<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_album(album.clone()))
    }

    pub fn set_performers(&mut self, performers: Vec<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_performers(performers.clone()))
    }

    pub fn set_composers(&mut self, composers: Vec<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_composers(composers.clone()))
    }

    pub fn set_genres(&mut self, genres: Vec<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_genres(genres.clone()))
    }

    pub fn set_track(&mut self, track: Option<u32>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_track(track))
    }

    pub fn set_track_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_track_count(count))
    }

    pub fn set_disc(&mut self, disc: Option<u32>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_disc(disc))
    }

    pub fn set_disc_count(&mut self, count: Option<u32>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_disc_count(count))
    }

    pub fn set_year(&mut self, year: Option<u32>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_year(year))
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_comment(comment.clone()))
    }

    pub fn set_copyright(&mut self, copyright: Option<String>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_copyright(copyright.clone()))
    }

    pub fn set_pictures(&mut self, pictures: Vec<Picture>) -> Result<(), TagError> {
        self.fan_out(|t| t.set_pictures(pictures.clone()))
    }

    /// 所有后备标签均为空（没有后备标签时视为空）
    pub fn is_empty(&self) -> bool {
        self.tags.iter().all(|t| t.as_tag().is_empty())
    }

    /// 清空所有后备标签的字段
    pub fn clear(&mut self) {
        for tag in &mut self.tags {
            tag.as_tag_mut().clear();
        }
    }

    /// 采集聚合视图的快照
    pub fn snapshot(&self) -> TagData {
        TagData {
            title: self.title(),
            album: self.album(),
            performers: self.performers(),
            composers: self.composers(),
            genres: self.genres(),
            track: self.track(),
            track_count: self.track_count(),
            disc: self.disc(),
            disc_count: self.disc_count(),
            year: self.year(),
            comment: self.comment(),
            copyright: self.copyright(),
        }
    }

    /// 应用快照中出现的字段（缺省字段保持不变）
    ///
    /// 与写入扇出同样的容错策略：逐字段写入，记住第一个错误，
    /// 写完所有字段后再报告。
    pub fn apply(&mut self, data: &TagData) -> Result<(), TagError> {
        let mut first_error = None;
        let mut remember = |result: Result<(), TagError>| {
            if let Err(error) = result {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        };

        if data.title.is_some() {
            remember(self.set_title(data.title.clone()));
        }
        if data.album.is_some() {
            remember(self.set_album(data.album.clone()));
        }
        if !data.performers.is_empty() {
            remember(self.set_performers(data.performers.clone()));
        }
        if !data.composers.is_empty() {
            remember(self.set_composers(data.composers.clone()));
        }
        if !data.genres.is_empty() {
            remember(self.set_genres(data.genres.clone()));
        }
        if data.track.is_some() {
            remember(self.set_track(data.track));
        }
        if data.track_count.is_some() {
            remember(self.set_track_count(data.track_count));
        }
        if data.disc.is_some() {
            remember(self.set_disc(data.disc));
        }
        if data.disc_count.is_some() {
            remember(self.set_disc_count(data.disc_count));
        }
        if data.year.is_some() {
            remember(self.set_year(data.year));
        }
        if data.comment.is_some() {
            remember(self.set_comment(data.comment.clone()));
        }
        if data.copyright.is_some() {
            remember(self.set_copyright(data.copyright.clone()));
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined_with_both() -> CombinedTag {
        let mut combined = CombinedTag::new();
        combined.push(ApeTag::new());
        combined.push(Id3v1Tag::new());
        combined
    }

    #[test]
    fn test_read_precedence() {
        let mut combined = CombinedTag::new();
        combined.push(ApeTag::new()); // 第一个标签没有标题

        let mut legacy = Id3v1Tag::new();
        legacy.title = "From Legacy".to_string();
        combined.push(legacy);

        // 第一个非空值来自序列中的第二个标签
        assert_eq!(combined.title().as_deref(), Some("From Legacy"));

        // 第一个标签有值后优先生效
        let mut modern = ApeTag::new();
        modern.set_title(Some("From Modern".to_string())).unwrap();
        let mut combined = CombinedTag::new();
        combined.push(modern);
        let mut legacy = Id3v1Tag::new();
        legacy.title = "From Legacy".to_string();
        combined.push(legacy);
        assert_eq!(combined.title().as_deref(), Some("From Modern"));
    }

    #[test]
    fn test_write_fan_out_updates_all() {
        let mut combined = combined_with_both();
        combined.set_title(Some("Shared Title".to_string())).unwrap();

        for tag in combined.tags() {
            assert_eq!(tag.as_tag().title().as_deref(), Some("Shared Title"));
        }
    }

    #[test]
    fn test_fan_out_skips_unsupported() {
        let mut combined = combined_with_both();
        // ID3v1不支持作曲者，扇出应跳过它而不报错
        combined
            .set_composers(vec!["A. Composer".to_string()])
            .unwrap();

        assert_eq!(combined.composers(), vec!["A. Composer"]);
        let legacy = combined.tag(TagType::Id3v1).unwrap();
        assert!(legacy.as_tag().composers().is_empty());
    }

    #[test]
    fn test_multi_value_fallback() {
        let mut combined = combined_with_both();
        // 只有遗留标签有艺术家
        if let Some(ConcreteTag::Id3v1(legacy)) = combined.tag_mut(TagType::Id3v1) {
            legacy.artist = "Solo Artist".to_string();
        }
        assert_eq!(combined.performers(), vec!["Solo Artist"]);

        // 现代标签有值后整个列表来自它，不与遗留标签合并
        if let Some(ConcreteTag::Ape(modern)) = combined.tag_mut(TagType::Ape) {
            modern
                .set_performers(vec!["Band".to_string(), "Guest".to_string()])
                .unwrap();
        }
        assert_eq!(combined.performers(), vec!["Band", "Guest"]);
    }

    #[test]
    fn test_joined_and_first_accessors() {
        let mut combined = CombinedTag::new();
        let mut modern = ApeTag::new();
        modern
            .set_genres(vec!["Rock".to_string(), "Electronic".to_string()])
            .unwrap();
        combined.push(modern);

        assert_eq!(
            combined.joined_genres().as_deref(),
            Some("Rock; Electronic")
        );
        assert_eq!(combined.first_genre().as_deref(), Some("Rock"));
        assert_eq!(combined.joined_performers(), None);
        assert_eq!(combined.first_performer(), None);
    }

    #[test]
    fn test_is_empty() {
        let mut combined = CombinedTag::new();
        // 没有后备标签时视为空
        assert!(combined.is_empty());

        combined.push(ApeTag::new());
        combined.push(Id3v1Tag::new());
        assert!(combined.is_empty());

        combined.set_album(Some("City Lights".to_string())).unwrap();
        assert!(!combined.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut combined = combined_with_both();
        combined.set_title(Some("Kept".to_string())).unwrap();

        assert!(combined.remove(TagType::Id3v1).is_some());
        assert!(!combined.contains(TagType::Id3v1));

        // 摘除不存在的格式不改变可见状态
        let before = combined.snapshot();
        assert!(combined.remove(TagType::Id3v1).is_none());
        assert_eq!(combined.snapshot(), before);
        assert_eq!(combined.tag_count(), 1);
    }

    #[test]
    fn test_removed_values_disappear_immediately() {
        let mut combined = CombinedTag::new();
        let mut legacy = Id3v1Tag::new();
        legacy.title = "Legacy Only".to_string();
        combined.push(legacy);

        assert_eq!(combined.title().as_deref(), Some("Legacy Only"));
        combined.remove(TagType::Id3v1);
        assert_eq!(combined.title(), None);
    }

    #[test]
    fn test_clear() {
        let mut combined = combined_with_both();
        combined.set_title(Some("Gone Soon".to_string())).unwrap();
        combined.clear();
        assert!(combined.is_empty());
        // 清空字段不摘除标签本身
        assert_eq!(combined.tag_count(), 2);
    }

    #[test]
    fn test_snapshot_apply_roundtrip() {
        let mut source = combined_with_both();
        source.set_title(Some("Night Drive".to_string())).unwrap();
        source
            .set_performers(vec!["The Editors".to_string()])
            .unwrap();
        source.set_track(Some(3)).unwrap();
        source.set_year(Some(2019)).unwrap();

        let snapshot = source.snapshot();

        let mut target = combined_with_both();
        target.apply(&snapshot).unwrap();
        assert_eq!(target.title().as_deref(), Some("Night Drive"));
        assert_eq!(target.performers(), vec!["The Editors"]);
        assert_eq!(target.track(), Some(3));
        assert_eq!(target.year(), Some(2019));
    }

    #[test]
    fn test_apply_partial_keeps_existing_fields() {
        let mut combined = combined_with_both();
        combined.set_title(Some("Original".to_string())).unwrap();
        combined.set_year(Some(2019)).unwrap();

        let partial = TagData {
            year: Some(2024),
            ..Default::default()
        };
        combined.apply(&partial).unwrap();

        assert_eq!(combined.title().as_deref(), Some("Original"));
        assert_eq!(combined.year(), Some(2024));
    }
}
