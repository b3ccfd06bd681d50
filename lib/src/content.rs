/*! Matching patterns against the contents of files.

Only the window of the file that can contain a match is loaded. The window
begins at the start of the region and is as long as the longest instance of
the pattern. One guard byte past the window is loaded too, so that end
anchors can tell whether the match is followed by more data. The window is
mapped into memory, or read with a positioned read when mapping is disabled
or fails.
*/

use std::fs::File;
use std::io;

#[cfg(feature = "logging")]
use log::*;
use memmap2::{Mmap, MmapOptions};

use crate::bits::{to_bit, to_byte, to_padded_byte, BitRange, BYTE};
use crate::config::ContentConfig;
use crate::errors::ContentError;
use crate::hit::Hit;
use crate::mode::MatchMode;
use crate::patterns::{PatternId, PatternPool};

/// Contents of the window being matched.
enum Window {
    Mmap(Mmap),
    Buffer(Vec<u8>),
}

impl AsRef<[u8]> for Window {
    fn as_ref(&self) -> &[u8] {
        match self {
            Window::Mmap(m) => m.as_ref(),
            Window::Buffer(b) => b.as_slice(),
        }
    }
}

/// Returns the bits of a file of `size_bits` bits where a pattern with the
/// given sample range can match within `region`.
///
/// In [`MatchMode::Partial`] mode the match can begin anywhere in the
/// region, so the window extends up to the end of the region. Returns
/// `None` if the region begins past the end of the file or the pattern has
/// no instances.
pub fn content_window(
    sample: BitRange,
    region: BitRange,
    size_bits: u64,
    mode: MatchMode,
) -> Option<BitRange> {
    if !sample.is_defined() || !region.is_defined() || region.low > size_bits
    {
        return None;
    }
    let reach = match mode {
        MatchMode::Partial => region.high,
        MatchMode::Anchored | MatchMode::Full => {
            region.low.saturating_add(sample.high)
        }
    };
    Some(BitRange::new(
        region.low,
        reach.min(region.high).min(size_bits),
    ))
}

/// Size of a memory page, in bytes.
#[cfg(unix)]
fn page_size() -> u64 {
    unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) }.try_into().unwrap_or(4096)
}

#[cfg(not(unix))]
fn page_size() -> u64 {
    4096
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(not(unix))]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = file;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

fn read_window(
    file: &File,
    offset: u64,
    len: usize,
) -> Result<Window, ContentError> {
    let mut buffer = vec![0; len];
    read_at(file, &mut buffer, offset)
        .map_err(|err| ContentError::ReadError { offset, len, err })?;
    Ok(Window::Buffer(buffer))
}

fn load_window(
    file: &File,
    offset: u64,
    len: usize,
    config: &ContentConfig,
) -> Result<Window, ContentError> {
    if len == 0 {
        return Ok(Window::Buffer(Vec::new()));
    }

    if !config.use_mmap {
        return read_window(file, offset, len);
    }

    let mapped =
        unsafe { MmapOptions::new().offset(offset).len(len).map(file) };

    match mapped {
        Ok(mmap) => Ok(Window::Mmap(mmap)),
        Err(err) if config.read_fallback => {
            #[cfg(feature = "logging")]
            warn!(
                "can not map {} bytes at offset {}, reading them: {}",
                len, offset, err
            );
            #[cfg(not(feature = "logging"))]
            let _ = err;
            read_window(file, offset, len)
        }
        Err(err) => Err(ContentError::MapError { offset, len, err }),
    }
}

impl PatternPool {
    /// Matches a pattern against the `region` of the contents of `file`.
    ///
    /// `size` is the size of the file in bytes, it's obtained from the file
    /// metadata when not given. When the file is mapped into memory the
    /// size is limited to the actual size of the file. The returned hit is
    /// relative to the beginning of the file.
    pub fn match_contents_of(
        &self,
        id: PatternId,
        file: &File,
        size: Option<u64>,
        region: BitRange,
        mode: MatchMode,
        config: &ContentConfig,
    ) -> Result<Option<Hit>, ContentError> {
        let size = match size {
            Some(size) if !config.use_mmap => size,
            _ => {
                let actual = file
                    .metadata()
                    .map_err(|err| ContentError::MetadataError { err })?
                    .len();
                size.map_or(actual, |size| size.min(actual))
            }
        };

        let Some(window) = content_window(
            self.sample_range(id),
            region,
            to_bit(size),
            mode,
        ) else {
            return Ok(None);
        };

        let page = page_size().max(1);

        // The window starts at a page boundary, keeping at least one byte
        // before the region so that beginning-of-buffer and beginning-of-line
        // anchors don't hold at the start of a region that isn't the start
        // of the file.
        let first = to_byte(window.low);
        let map_offset = (first.saturating_sub(1) / page) * page;
        let map_end =
            to_padded_byte(window.high.saturating_add(BYTE)).min(size);
        let len = map_end.saturating_sub(map_offset) as usize;

        let data = load_window(file, map_offset, len, config)?;

        let base = to_bit(map_offset);
        let local = BitRange::new(window.low - base, window.high - base);

        Ok(self
            .match_in(id, data.as_ref(), local, mode)
            .map(|hit| hit.shifted(base)))
    }
}
