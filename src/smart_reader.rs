use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Opens a gVCF and transparently peels off a GZIP or BGZF layer.
///
/// Detection is by magic bytes rather than extension, so `.g.vcf` files that
/// are actually compressed (and vice versa) still read correctly.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let is_gzip = {
        let buf = reader.fill_buf()?;
        // GZIP magic: 1f 8b. BGZF blocks are GZIP members.
        buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b
    };

    if is_gzip {
        tracing::debug!(path = %path.display(), "detected GZIP/BGZF layer");
        // MultiGzDecoder walks every concatenated member, which BGZF relies on
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}
