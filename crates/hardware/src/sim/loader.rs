//! Program and data image loading.
//!
//! Images are flat, word-aligned binary files: no object-file headers, no
//! relocation. Bytes are packed four at a time, little-endian, into
//! consecutive words of [`Memory`]'s backing store starting at a configured
//! base address.

use std::fs;
use std::io;
use std::path::Path;

use crate::common::error::SimFault;
use crate::core::units::cache::Memory;

/// Reads `path` and writes its bytes into `memory` starting at word address
/// `base` (must be a multiple of 4).
///
/// # Errors
///
/// Returns [`SimFault::Io`] if `path` cannot be read, if `base` is not
/// word-aligned, or if the image does not fit in the remaining backing
/// memory.
pub fn load_image(memory: &mut Memory, path: &Path, base: u32) -> Result<(), SimFault> {
    if base % 4 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("load address {base:#010x} is not word-aligned"),
        )
        .into());
    }

    let bytes = fs::read(path)?;
    let base_word = (base / 4) as usize;
    let word_count = bytes.len().div_ceil(4);
    let words = memory.words_mut();

    if base_word + word_count > words.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "image '{}' ({} bytes) does not fit in memory at {base:#010x}",
                path.display(),
                bytes.len()
            ),
        )
        .into());
    }

    for (i, chunk) in bytes.chunks(4).enumerate() {
        let mut word_bytes = [0u8; 4];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        words[base_word + i] = u32::from_le_bytes(word_bytes);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use tempfile::NamedTempFile;

    fn blank_memory() -> Memory {
        Memory::new(&CacheConfig::default(), &CacheConfig::default(), 1024)
    }

    #[test]
    fn loads_bytes_as_little_endian_words_at_base() {
        let mut file = NamedTempFile::new().unwrap();
        fs::write(file.path(), [0x78, 0x56, 0x34, 0x12, 0xef, 0xbe]).unwrap();
        let mut memory = blank_memory();
        load_image(&mut memory, file.path(), 0x40).unwrap();
        assert_eq!(memory.words()[0x40 / 4], 0x1234_5678);
        assert_eq!(memory.words()[0x40 / 4 + 1], 0x0000_beef);
        file.close().unwrap();
    }

    #[test]
    fn rejects_unaligned_base() {
        let file = NamedTempFile::new().unwrap();
        let mut memory = blank_memory();
        let err = load_image(&mut memory, file.path(), 2).unwrap_err();
        assert!(err.to_string().contains("word-aligned"));
    }

    #[test]
    fn rejects_image_that_does_not_fit() {
        let mut file = NamedTempFile::new().unwrap();
        fs::write(file.path(), vec![0u8; 4096 * 4]).unwrap();
        let mut memory = blank_memory();
        let err = load_image(&mut memory, file.path(), 0).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn missing_file_surfaces_as_io_fault() {
        let mut memory = blank_memory();
        let err = load_image(&mut memory, Path::new("/nonexistent/path/image.bin"), 0).unwrap_err();
        assert!(matches!(err, SimFault::Io(_)));
    }
}
