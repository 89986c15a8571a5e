use std::io::{self, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP_MAGIC: [u8; 2] = [0x42, 0x5A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

/// Sniffs the first two bytes of `path` to decide how to decode it,
/// mirroring `configuration.py`'s `open_file`.
pub fn sniff(path: &Path) -> io::Result<Compression> {
    let mut file = std::fs::File::open(path)?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Compression::None),
        Err(e) => return Err(e),
    }
    Ok(match magic {
        GZIP_MAGIC => Compression::Gzip,
        BZIP_MAGIC => Compression::Bzip2,
        _ => Compression::None,
    })
}

/// Decompresses `path` (auto-detected) into a freshly created temp file and
/// returns the handle; the file is removed when the handle is dropped.
pub fn decompress_to_tempfile(path: &Path) -> io::Result<tempfile::NamedTempFile> {
    let compression = sniff(path)?;
    let mut out = tempfile::Builder::new().prefix("paramcts_").tempfile()?;
    let source = std::fs::File::open(path)?;
    match compression {
        Compression::None => {
            let mut reader = source;
            io::copy(&mut reader, &mut out)?;
        }
        Compression::Gzip => {
            let mut reader = flate2::read::GzDecoder::new(source);
            io::copy(&mut reader, &mut out)?;
        }
        Compression::Bzip2 => {
            let mut reader = bzip2::read::BzDecoder::new(source);
            io::copy(&mut reader, &mut out)?;
        }
    }
    out.flush()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn sniffs_gzip_magic() {
        let mut src = tempfile::NamedTempFile::new().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello").unwrap();
        src.write_all(&encoder.finish().unwrap()).unwrap();
        src.flush().unwrap();
        assert_eq!(sniff(src.path()).unwrap(), Compression::Gzip);
    }

    #[test]
    fn sniffs_plain_as_none() {
        let mut src = tempfile::NamedTempFile::new().unwrap();
        src.write_all(b"plain text").unwrap();
        src.flush().unwrap();
        assert_eq!(sniff(src.path()).unwrap(), Compression::None);
    }

    #[test]
    fn decompresses_gzip_roundtrip() {
        let mut src = tempfile::NamedTempFile::new().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"instance contents").unwrap();
        src.write_all(&encoder.finish().unwrap()).unwrap();
        src.flush().unwrap();

        let decompressed = decompress_to_tempfile(src.path()).unwrap();
        let contents = std::fs::read_to_string(decompressed.path()).unwrap();
        assert_eq!(contents, "instance contents");
    }
}
