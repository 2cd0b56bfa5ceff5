//! Decompressor registry (component C): maps the superblock's 16-bit compression id to an
//! object implementing a single `uncompress(src, outsize) -> Vec<u8>` contract.

use std::fmt;
use std::io::Read;

use xz2::stream::{Filters, LzmaOptions, Stream};

use crate::error::{Result, SquashfsError};
use crate::superblock::Flags;
use crate::ReadSeek;

const COMPRESSOR_NONE: u16 = 0;
const COMPRESSOR_GZIP: u16 = 1;
const COMPRESSOR_LZMA: u16 = 2;
const COMPRESSOR_LZO: u16 = 3;
const COMPRESSOR_XZ: u16 = 4;
const COMPRESSOR_LZ4: u16 = 5;
const COMPRESSOR_ZSTD: u16 = 6;

/// The squashfs-specific ".lzma"-style header prefixing every raw-LZMA1 payload: one
/// properties byte (lc/lp/pb), four bytes of dictionary size, and eight bytes of uncompressed
/// size, all unused here since the expected output size is already known from the caller.
const LZMA_HEADER_SIZE: usize = 13;

#[derive(Clone)]
pub enum Compressor {
    None,
    Gzip,
    Lzma,
    Lzo,
    Xz,
    Lz4,
    Zstd,
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Compressor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Lzma => "lzma",
            Self::Lzo => "lzo",
            Self::Xz => "xz",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Builds the compressor named by the superblock's compression id, consuming any trailing
    /// compressor-options record from `reader` if the superblock's `COMPRESSOR_OPTIONS_PRESENT`
    /// flag is set. The options bytes themselves (gzip window size, xz BCJ filter id, ...) are
    /// read off but not otherwise interpreted: none of the six decoders used here need them to
    /// decode, since liblzma and the gzip/zstd/lz4 codecs self-describe their stream parameters.
    pub fn new(id: u16, flags: Flags, reader: &mut dyn ReadSeek) -> Result<Self> {
        let compressor = match id {
            COMPRESSOR_NONE => Self::None,
            COMPRESSOR_GZIP => Self::Gzip,
            COMPRESSOR_LZMA => Self::Lzma,
            COMPRESSOR_LZO => Self::Lzo,
            COMPRESSOR_XZ => Self::Xz,
            COMPRESSOR_LZ4 => Self::Lz4,
            COMPRESSOR_ZSTD => Self::Zstd,
            other => return Err(SquashfsError::compression(format!("unknown compressor id {other}"))),
        };

        if flags.contains(Flags::COMPRESSOR_OPTIONS_PRESENT) && !matches!(compressor, Self::None | Self::Lzma) {
            let opts_size = match compressor {
                Self::Gzip => 8,
                Self::Lzo => 8,
                Self::Xz => 8,
                Self::Lz4 => 8,
                Self::Zstd => 4,
                Self::None | Self::Lzma => 0,
            };
            let mut discard = vec![0u8; opts_size];
            std::io::Read::read_exact(reader, &mut discard)?;
        }

        Ok(compressor)
    }

    pub fn uncompress(&self, src: &[u8], outsize: usize) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(src[..outsize.min(src.len())].to_vec()),
            Self::Gzip => uncompress_gzip(src, outsize),
            Self::Lzma => uncompress_lzma(src, outsize),
            Self::Lzo => uncompress_lzo(src, outsize),
            Self::Xz => uncompress_xz(src, outsize),
            Self::Lz4 => uncompress_lz4(src, outsize),
            Self::Zstd => uncompress_zstd(src, outsize),
        }
    }
}

fn uncompress_gzip(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(src);
    let mut out = Vec::with_capacity(outsize);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn uncompress_lzma(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    if src.len() < LZMA_HEADER_SIZE {
        return Err(SquashfsError::compression("lzma payload shorter than header"));
    }
    let payload = &src[LZMA_HEADER_SIZE..];

    let mut opts = LzmaOptions::new_preset(9)
        .map_err(|e| SquashfsError::compression(format!("lzma options: {e}")))?;
    opts.literal_context_bits(3);
    opts.literal_position_bits(0);
    opts.position_bits(2);

    let mut filters = Filters::new();
    filters.lzma1(&opts);
    let stream = Stream::new_raw_decoder(&filters)
        .map_err(|e| SquashfsError::compression(format!("lzma decoder: {e}")))?;

    let mut decoder = xz2::read::XzDecoder::new_stream(payload, stream);
    let mut out = Vec::with_capacity(outsize);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn uncompress_xz(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    let mut decoder = xz2::read::XzDecoder::new(src);
    let mut out = Vec::with_capacity(outsize);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn uncompress_lzo(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; outsize];
    let (written, error) = rust_lzo::LZOContext::decompress_to_slice(src, &mut out);
    let written = written.len();
    if error != rust_lzo::LZOError::OK {
        return Err(SquashfsError::compression(format!("lzo decode failed: {error:?}")));
    }
    out.truncate(written);
    Ok(out)
}

fn uncompress_lz4(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    lz4_flex::block::decompress(src, outsize)
        .map_err(|e| SquashfsError::compression(format!("lz4 decode failed: {e}")))
}

fn uncompress_zstd(src: &[u8], outsize: usize) -> Result<Vec<u8>> {
    zstd::bulk::decompress(src, outsize)
        .map_err(|e| SquashfsError::compression(format!("zstd decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_copies_verbatim() {
        let c = Compressor::None;
        assert_eq!(c.uncompress(b"abcdef", 4).unwrap(), b"abcd");
    }

    #[test]
    fn gzip_round_trip() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let data = b"hello squashfs world, this is a gzip round trip test";
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        let compressed = enc.finish().unwrap();

        let c = Compressor::Gzip;
        let out = c.uncompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn zstd_round_trip() {
        let data = b"hello squashfs world, this is a zstd round trip test";
        let compressed = zstd::bulk::compress(data, 0).unwrap();
        let c = Compressor::Zstd;
        let out = c.uncompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lz4_round_trip() {
        let data = b"hello squashfs world, this is an lz4 round trip test";
        let compressed = lz4_flex::block::compress(data);
        let c = Compressor::Lz4;
        let out = c.uncompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn xz_round_trip() {
        use std::io::Write;
        use xz2::write::XzEncoder;

        let data = b"hello squashfs world, this is an xz round trip test";
        let mut enc = XzEncoder::new(Vec::new(), 6);
        enc.write_all(data).unwrap();
        let compressed = enc.finish().unwrap();

        let c = Compressor::Xz;
        let out = c.uncompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lzma_round_trip() {
        use std::io::Write;
        use xz2::write::XzEncoder;

        let data = b"hello squashfs world, this is an lzma round trip test";

        let mut opts = LzmaOptions::new_preset(9).unwrap();
        opts.literal_context_bits(3);
        opts.literal_position_bits(0);
        opts.position_bits(2);
        let mut filters = Filters::new();
        filters.lzma1(&opts);
        let stream = Stream::new_raw_encoder(&filters).unwrap();

        let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(data).unwrap();
        let payload = encoder.finish().unwrap();

        // the header bytes themselves are never inspected by `uncompress_lzma`, only skipped.
        let mut compressed = vec![0u8; LZMA_HEADER_SIZE];
        compressed.extend_from_slice(&payload);

        let c = Compressor::Lzma;
        let out = c.uncompress(&compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lzo_round_trip() {
        let data = b"hello squashfs world, this is an lzo round trip test";
        let mut lzo = rust_lzo::LZOContext::new();
        let mut buf = vec![0u8; rust_lzo::worst_compress(data.len())];
        let error = lzo.compress(data, &mut buf);
        assert_eq!(error, rust_lzo::LZOError::OK);

        let c = Compressor::Lzo;
        let out = c.uncompress(&buf, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn unknown_compressor_is_compression_error() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = Compressor::new(42, Flags::empty(), &mut cursor).unwrap_err();
        assert!(matches!(err, SquashfsError::Compression(_)));
    }
}
