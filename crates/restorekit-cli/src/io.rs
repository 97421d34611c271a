use std::fs;
use std::io::Read;

use flate2::read::GzDecoder;
use restorekit_core::{InputSource, RestoreError};

/// Filesystem and standard-input reads, with optional gzip decompression.
/// `path == "-"` means standard input, per the convention
/// `restorekit-core`'s `InputSource` doc comment records.
pub struct FsInput;

impl InputSource for FsInput {
    fn open_file(&self, path: &str, gzip: bool) -> Result<Box<dyn Read + Send>, RestoreError> {
        let raw: Box<dyn Read + Send> = if path == "-" {
            self.open_stdin()
        } else {
            Box::new(fs::File::open(path)?)
        };
        if gzip {
            Ok(Box::new(GzDecoder::new(raw)))
        } else {
            Ok(raw)
        }
    }

    fn open_stdin(&self) -> Box<dyn Read + Send> {
        Box::new(std::io::stdin())
    }
}
