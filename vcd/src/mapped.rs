use std::{
    borrow::Cow,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::info;
use memmap2::Mmap;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

enum Input {
    Mmap(Mmap),
    /// Decompressed gzip data, or an empty file (which can't be mapped on
    /// every platform).
    Owned(Vec<u8>),
}

/// The read-only contents of an input file.
///
/// Plain files are memory mapped. Gzipped files (`.vcd.gz` is common for
/// large traces) are detected by their magic number and decompressed into
/// memory instead.
pub struct MappedFile {
    path: PathBuf,
    input: Input,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Reading metadata of {}", path.display()))?
            .len();

        let input = if len == 0 {
            Input::Owned(Vec::new())
        } else {
            // The file must not be modified while it is mapped.
            let mmap = unsafe { Mmap::map(&file) }
                .with_context(|| format!("Mapping {}", path.display()))?;
            if mmap.starts_with(&GZIP_MAGIC) {
                let mut data = Vec::new();
                MultiGzDecoder::new(&mmap[..])
                    .read_to_end(&mut data)
                    .with_context(|| format!("Decompressing {}", path.display()))?;
                info!(
                    "Decompressed {} ({} -> {} bytes)",
                    path.display(),
                    mmap.len(),
                    data.len()
                );
                Input::Owned(data)
            } else {
                info!("Mapped {} ({} bytes)", path.display(), mmap.len());
                Input::Mmap(mmap)
            }
        };

        Ok(Self {
            path: path.to_owned(),
            input,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The (decompressed) bytes of the file.
    pub fn data(&self) -> &[u8] {
        match &self.input {
            Input::Mmap(mmap) => &mmap[..],
            Input::Owned(data) => &data[..],
        }
    }

    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// The file as text. Borrowed unless it contains invalid UTF-8, which is
    /// replaced.
    pub fn string_view(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.data())
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.input, Input::Owned(ref data) if !data.is_empty())
    }
}
