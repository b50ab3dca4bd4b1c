use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::ape::ApeTag;
use crate::combined::{CombinedTag, ConcreteTag};
use crate::editor::FileEditor;
use crate::id3v1::Id3v1Tag;
use crate::stream::FileStream;
use crate::tag::{Tag, TagData, TagType};
use crate::utils::TagError;

/// 媒体容器类型（按扩展名识别）
///
/// 这组容器的标签都附着在文件末尾，核心编辑流程相同；
/// 类型主要决定默认的首选标签格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Mpeg,
    MonkeysAudio,
    Musepack,
    WavPack,
}

impl FileKind {
    /// 从扩展名识别
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" | "mp2" => Some(FileKind::Mpeg),
            "ape" => Some(FileKind::MonkeysAudio),
            "mpc" => Some(FileKind::Musepack),
            "wv" => Some(FileKind::WavPack),
            _ => None,
        }
    }

    /// 从路径识别
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 该容器的首选标签格式
    pub fn primary_tag_type(&self) -> TagType {
        // 这组容器都以APE为首选，ID3v1仅作兼容回退
        TagType::Ape
    }

    /// 是否支持指定标签格式
    pub fn supports_tag_type(&self, _tag_type: TagType) -> bool {
        true
    }
}

/// 容器文件的标签访问契约
///
/// 共享的编辑与查找逻辑位于具体的`FileEditor`中，容器实现组合它
/// 而非继承。
pub trait TaggedFile {
    /// 聚合标签视图
    fn tag(&self) -> &CombinedTag;

    /// 聚合标签视图（可变）
    fn tag_mut(&mut self) -> &mut CombinedTag;

    /// 将当前标签写回文件
    fn save(&mut self) -> Result<(), TagError>;

    /// 从文件与视图中移除指定格式的标签
    fn strip(&mut self, tag_type: TagType) -> Result<(), TagError>;
}

/// 媒体文件
///
/// 打开时扫描文件末尾的标签结构（APE在前、ID3v1殿后的布局），
/// 为每个找到的格式建立具体标签并组成聚合视图。保存时剥离旧的
/// 标签区间，再按规范顺序追加重新渲染的标签；音频负载的每个字节
/// 保持原样。
pub struct MediaFile {
    kind: Option<FileKind>,
    editor: FileEditor,
    combined: CombinedTag,
}

impl MediaFile {
    /// 以读写模式打开
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let kind = FileKind::from_path(&path);
        let editor = FileEditor::open(path)?;
        Self::build(kind, editor)
    }

    /// 以只读模式打开（保存与剥离会被拒绝）
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let kind = FileKind::from_path(&path);
        let editor = FileEditor::open_read_only(path)?;
        Self::build(kind, editor)
    }

    /// 绑定调用方提供的资源
    pub fn from_stream(stream: Box<dyn FileStream>) -> Result<Self, TagError> {
        let kind = FileKind::from_path(stream.name());
        let editor = FileEditor::new(stream)?;
        Self::build(kind, editor)
    }

    fn build(kind: Option<FileKind>, mut editor: FileEditor) -> Result<Self, TagError> {
        let combined = Self::scan(&mut editor)?;
        Ok(MediaFile {
            kind,
            editor,
            combined,
        })
    }

    /// 扫描文件末尾的标签，按格式优先级组装聚合视图
    fn scan(editor: &mut FileEditor) -> Result<CombinedTag, TagError> {
        let mut combined = CombinedTag::new();

        // ID3v1固定在最后128字节；APE（若有）紧随其前
        let id3v1_offset = Id3v1Tag::locate(editor)?;
        if let Some(ape) = ApeTag::read_from(editor, id3v1_offset)? {
            combined.push(ape);
        }
        if let Some(id3v1) = Id3v1Tag::read_from(editor)? {
            combined.push(id3v1);
        }

        Ok(combined)
    }

    /// 识别出的容器类型
    pub fn kind(&self) -> Option<FileKind> {
        self.kind
    }

    /// 资源名称
    pub fn name(&self) -> &str {
        self.editor.name()
    }

    /// 文件当前长度
    pub fn length(&self) -> u64 {
        self.editor.length()
    }

    /// 确保聚合视图中存在指定格式的（可能为空的）标签
    pub fn add_tag(&mut self, tag_type: TagType) {
        if self.combined.contains(tag_type) {
            return;
        }
        match tag_type {
            TagType::Ape => self.combined.insert_ordered(ApeTag::new()),
            TagType::Id3v1 => self.combined.insert_ordered(Id3v1Tag::new()),
        }
    }

    /// 移除所有标签（文件与视图）
    pub fn remove_tags(&mut self) -> Result<(), TagError> {
        self.strip(TagType::Id3v1)?;
        self.strip(TagType::Ape)?;
        Ok(())
    }

    /// 关闭底层编辑会话
    pub fn close(&mut self) -> Result<(), TagError> {
        self.editor.close()
    }
}

impl TaggedFile for MediaFile {
    fn tag(&self) -> &CombinedTag {
        &self.combined
    }

    fn tag_mut(&mut self) -> &mut CombinedTag {
        &mut self.combined
    }

    fn save(&mut self) -> Result<(), TagError> {
        // 从文件末尾向前剥离旧标签区间，偏移在剥离过程中保持有效
        Id3v1Tag::strip(&mut self.editor)?;
        ApeTag::strip(&mut self.editor, None)?;

        // 按布局顺序追加：APE在前，ID3v1必须是文件的最后128字节。
        // 空标签整体省略。
        if let Some(ConcreteTag::Ape(ape)) = self.combined.tag(TagType::Ape) {
            if !ape.is_empty() {
                let rendered = ape.render();
                let end = self.editor.length();
                self.editor.insert_block(&rendered, end)?;
            }
        }
        if let Some(ConcreteTag::Id3v1(id3v1)) = self.combined.tag(TagType::Id3v1) {
            if !id3v1.is_empty() {
                let rendered = id3v1.render();
                let end = self.editor.length();
                self.editor.insert_block(&rendered, end)?;
            }
        }
        Ok(())
    }

    fn strip(&mut self, tag_type: TagType) -> Result<(), TagError> {
        match tag_type {
            TagType::Id3v1 => {
                Id3v1Tag::strip(&mut self.editor)?;
            }
            TagType::Ape => {
                let boundary = Id3v1Tag::locate(&mut self.editor)?;
                ApeTag::strip(&mut self.editor, boundary)?;
            }
        }
        self.combined.remove(tag_type);
        Ok(())
    }
}

/// 并行读取多个文件的标签快照
///
/// 只读打开，单个文件的失败不影响其余文件。
pub fn scan_paths(paths: &[PathBuf]) -> Vec<(PathBuf, Result<TagData, TagError>)> {
    paths
        .par_iter()
        .map(|path| {
            let result = MediaFile::open_read_only(path).map(|file| file.tag().snapshot());
            (path.clone(), result)
        })
        .collect()
}
