use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Data format of a file, or of the value encoded by a pattern.
///
/// Some variants are categories that contain other formats, see
/// [`DataFormat::contains`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum DataFormat {
    /// Any data format, contains every other format.
    #[default]
    Any,

    /// Binary formats.
    Binary,
    /// Executable and Linkable Format.
    Elf,
    /// ELF relocatable object.
    ElfObject,
    /// ELF executable.
    ElfExecutable,

    /// Audio formats.
    Audio,
    Mp3,
    Wav,

    /// Image formats.
    Image,
    Bmp,
    Gif,
    Jpeg,
    Png,
    Tiff,

    /// Video formats.
    Video,
    Matroska,

    /// Compressed formats.
    Compressed,
    Bzip2,
    Compress,
    Gzip,
    Lzma,
    Xz,
    Zip,

    /// Archive formats.
    Archive,
    Ar,
    Tar,

    /// Text formats.
    Text,
    Ascii,
    Xml,
    Html,

    /// Build scripts.
    Build,
    Makefile,
    CMake,

    /// Source code.
    SourceCode,
    C,
    CSource,
    CHeader,
    Cxx,
    CxxSource,
    CxxHeader,
    Python,
    Shell,
}

impl DataFormat {
    /// The category this format belongs to, `None` for [`DataFormat::Any`].
    pub fn category(&self) -> Option<DataFormat> {
        use DataFormat::*;
        let category = match self {
            Any => return None,
            Binary | Audio | Image | Video | Compressed | Archive | Text
            | Build | SourceCode => Any,
            Elf => Binary,
            ElfObject | ElfExecutable => Elf,
            Mp3 | Wav => Audio,
            Bmp | Gif | Jpeg | Png | Tiff => Image,
            Matroska => Video,
            Bzip2 | Compress | Gzip | Lzma | Xz | Zip => Compressed,
            Ar | Tar => Archive,
            Ascii | Xml | Html => Text,
            Makefile | CMake => Build,
            C | Cxx | Python | Shell => SourceCode,
            CSource | CHeader => C,
            CxxSource | CxxHeader => Cxx,
        };
        Some(category)
    }

    /// Returns `true` if `other` is this format or belongs to it, directly
    /// or through intermediate categories.
    pub fn contains(&self, other: DataFormat) -> bool {
        let mut current = Some(other);
        while let Some(format) = current {
            if format == *self {
                return true;
            }
            current = format.category();
        }
        false
    }

    /// Returns `true` for audio formats.
    pub fn is_audio(&self) -> bool {
        DataFormat::Audio.contains(*self)
    }

    /// Returns `true` for image formats.
    pub fn is_image(&self) -> bool {
        DataFormat::Image.contains(*self)
    }

    /// Returns `true` for video formats.
    pub fn is_video(&self) -> bool {
        DataFormat::Video.contains(*self)
    }

    /// Returns `true` for compressed formats.
    pub fn is_compressed(&self) -> bool {
        DataFormat::Compressed.contains(*self)
    }

    /// Returns `true` for source code.
    pub fn is_source(&self) -> bool {
        DataFormat::SourceCode.contains(*self)
    }
}

impl Display for DataFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use DataFormat::*;
        let name = match self {
            Any => "any",
            Binary => "binary",
            Elf => "elf",
            ElfObject => "elf-object",
            ElfExecutable => "elf-executable",
            Audio => "audio",
            Mp3 => "mp3",
            Wav => "wav",
            Image => "image",
            Bmp => "bmp",
            Gif => "gif",
            Jpeg => "jpeg",
            Png => "png",
            Tiff => "tiff",
            Video => "video",
            Matroska => "matroska",
            Compressed => "compressed",
            Bzip2 => "bzip2",
            Compress => "compress",
            Gzip => "gzip",
            Lzma => "lzma",
            Xz => "xz",
            Zip => "zip",
            Archive => "archive",
            Ar => "ar",
            Tar => "tar",
            Text => "text",
            Ascii => "ascii",
            Xml => "xml",
            Html => "html",
            Build => "build",
            Makefile => "makefile",
            CMake => "cmake",
            SourceCode => "source-code",
            C => "c",
            CSource => "c-source",
            CHeader => "c-header",
            Cxx => "cxx",
            CxxSource => "cxx-source",
            CxxHeader => "cxx-header",
            Python => "python",
            Shell => "shell",
        };
        f.write_str(name)
    }
}

/// Operations that can be applied to the files of a given type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Operation {
    /// Show the contents.
    Show,
    /// Edit the contents.
    Edit,
    /// Run as a program.
    Execute,
    /// Compile into another format.
    Compile,
    /// Uncompress into the original data.
    Decompress,
    /// Extract the files in an archive.
    Extract,
    /// Convert to another format.
    Convert,
    /// Play as audio or video.
    Play,
}
