use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, trace};
use ndarray::{concatenate, Array3, ArrayView3, Axis};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;

use super::model::{SampleImage, TaxonomyEntry, TaxonomyTable};
use crate::error::{PoldivError, Result};

// ---------------------------------------------------------------------------
// Archive iteration
// ---------------------------------------------------------------------------

/// A `.tar.gz` archive opened for a single forward pass.
pub struct ArchiveReader<R: Read> {
    archive: tar::Archive<R>,
}

impl ArchiveReader<GzDecoder<BufReader<File>>> {
    /// Open a gzip-compressed tarball.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(GzDecoder::new(BufReader::new(file))))
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Wrap an already-decompressed tar stream.
    pub fn from_reader(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(reader),
        }
    }

    /// Iterate the regular files as `(path inside archive, handle)`.
    ///
    /// Each handle must be consumed (or dropped) before the next is pulled.
    pub fn files(&mut self) -> Result<ArchiveFiles<'_, R>> {
        Ok(ArchiveFiles {
            entries: self.archive.entries()?,
        })
    }
}

/// Iterator over the regular files of an [`ArchiveReader`].
pub struct ArchiveFiles<'a, R: 'a + Read> {
    entries: tar::Entries<'a, R>,
}

impl<'a, R: 'a + Read> Iterator for ArchiveFiles<'a, R> {
    type Item = Result<(String, tar::Entry<'a, R>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = match entry.path() {
                Ok(path) => path.into_owned(),
                Err(e) => return Some(Err(e.into())),
            };
            let Some(name) = path.to_str() else {
                return Some(Err(PoldivError::NonUtf8Path(path.to_string_lossy().into_owned())));
            };
            trace!("archive entry {name}");
            return Some(Ok((name.to_string(), entry)));
        }
    }
}

// ---------------------------------------------------------------------------
// TIFF decoding
// ---------------------------------------------------------------------------

/// Read `handle` to the end and decode it as a multi-plane 16-bit TIFF.
pub fn read_sample<H: Read>(filename: &str, mut handle: H) -> Result<SampleImage> {
    let mut bytes = Vec::new();
    handle.read_to_end(&mut bytes)?;
    decode_sample(filename, &bytes)
}

/// Decode TIFF bytes into a `(height, width, planes)` array.
///
/// Accepts a single page with any number of interleaved 16-bit samples, a
/// stack of 16-bit pages, or a mix; planes are concatenated in page order.
pub fn decode_sample(filename: &str, bytes: &[u8]) -> Result<SampleImage> {
    let decode_err = |source| PoldivError::Decode {
        filename: filename.to_string(),
        source,
    };

    let mut decoder = Decoder::new(Cursor::new(bytes))
        .map_err(decode_err)?
        .with_limits(Limits::unlimited());
    let expected = decoder.dimensions().map_err(decode_err)?;

    let mut pages: Vec<Array3<u16>> = Vec::new();
    loop {
        let page = pages.len();
        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        if (width, height) != expected {
            return Err(PoldivError::PageSizeMismatch {
                filename: filename.to_string(),
                page,
                expected,
                got: (width, height),
            });
        }

        let samples = match decoder.colortype().map_err(decode_err)? {
            ColorType::Gray(16) => 1,
            ColorType::Multiband {
                bit_depth: 16,
                num_samples,
            } => num_samples as usize,
            other => {
                return Err(PoldivError::UnsupportedSamples {
                    filename: filename.to_string(),
                    detail: format!("{other:?} on page {page}"),
                })
            }
        };

        let data = match decoder.read_image().map_err(decode_err)? {
            DecodingResult::U16(v) => v,
            _ => {
                return Err(PoldivError::UnsupportedSamples {
                    filename: filename.to_string(),
                    detail: format!("non 16-bit data on page {page}"),
                })
            }
        };
        pages.push(Array3::from_shape_vec(
            (height as usize, width as usize, samples),
            data,
        )?);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(decode_err)?;
    }

    let image = if pages.len() == 1 {
        pages.remove(0)
    } else {
        let views: Vec<ArrayView3<'_, u16>> = pages.iter().map(|p| p.view()).collect();
        concatenate(Axis(2), &views)?
    };
    debug!("{filename}: decoded {:?}", image.dim());
    Ok(image)
}

/// Write `image` as a stack of 16-bit grayscale pages, one per plane.
pub fn write_sample<W: Write + Seek>(writer: W, image: ArrayView3<'_, u16>) -> Result<()> {
    let (height, width, planes) = image.dim();
    let mut encoder = TiffEncoder::new(writer).map_err(PoldivError::Encode)?;
    for k in 0..planes {
        let plane: Vec<u16> = image.index_axis(Axis(2), k).iter().copied().collect();
        encoder
            .write_image::<colortype::Gray16>(width as u32, height as u32, &plane)
            .map_err(PoldivError::Encode)?;
    }
    Ok(())
}

/// Write `image` as one uncompressed little-endian page with every plane as an
/// interleaved sample (`PlanarConfiguration = 1`), the layout of the
/// instrument exports.
pub fn write_interleaved_sample<W: Write>(mut writer: W, image: ArrayView3<'_, u16>) -> Result<()> {
    let (height, width, planes) = image.dim();
    let samples = planes as u32;
    let entries: u16 = 10;
    let ifd_end = 8 + 2 + 12 * entries as u32 + 4;

    // BitsPerSample only fits inline for up to two samples.
    let bits_inline = samples <= 2;
    let bits_len = if bits_inline { 0 } else { 2 * samples };
    let data_offset = ifd_end + bits_len;
    let data_len = 2 * (height * width * planes) as u32;

    let mut out = Vec::with_capacity((data_offset + data_len) as usize);
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    out.extend_from_slice(&entries.to_le_bytes());

    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    let mut entry = |tag: u16, kind: u16, count: u32, value: u32| {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    };
    let bits_value = if bits_inline {
        if samples == 2 { 16 | (16 << 16) } else { 16 }
    } else {
        ifd_end
    };

    entry(256, LONG, 1, width as u32);
    entry(257, LONG, 1, height as u32);
    entry(258, SHORT, samples, bits_value);
    entry(259, SHORT, 1, 1);
    entry(262, SHORT, 1, 1);
    entry(273, LONG, 1, data_offset);
    entry(277, SHORT, 1, samples);
    entry(278, LONG, 1, height as u32);
    entry(279, LONG, 1, data_len);
    entry(284, SHORT, 1, 1);
    out.extend_from_slice(&0u32.to_le_bytes());

    if !bits_inline {
        for _ in 0..samples {
            out.extend_from_slice(&16u16.to_le_bytes());
        }
    }
    for v in image.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    writer.write_all(&out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Side tables
// ---------------------------------------------------------------------------

/// Load the headerless two-column species → genus CSV.
pub fn load_taxonomy(path: &Path) -> Result<TaxonomyTable> {
    let file = File::open(path)?;
    let table = read_taxonomy(file)?;
    debug!("loaded {} taxonomy rows from {}", table.len(), path.display());
    Ok(table)
}

pub fn read_taxonomy<R: Read>(reader: R) -> Result<TaxonomyTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let entries = reader
        .deserialize::<TaxonomyEntry>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(TaxonomyTable::new(entries))
}

/// Load a class-name file: one label per line, blank lines ignored.
pub fn load_names(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_names(&text))
}

pub fn parse_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_page_stack_decodes_to_same_planes() {
        let image = Array3::from_shape_fn((5, 7, 18), |(r, c, k)| (r * 1000 + c * 20 + k) as u16);
        let mut buf = Cursor::new(Vec::new());
        write_sample(&mut buf, image.view()).unwrap();

        let decoded = read_sample("stack.tif", Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn interleaved_page_splits_into_planes() {
        let image = Array3::from_shape_fn((3, 4, 18), |(r, c, k)| (r * 1000 + c * 50 + k) as u16);
        let mut bytes = Vec::new();
        write_interleaved_sample(&mut bytes, image.view()).unwrap();

        let decoded = decode_sample("chunky.tif", &bytes).unwrap();
        assert_eq!(decoded.dim(), (3, 4, 18));
        assert_eq!(decoded[[2, 3, 13]], 2163);
        assert_eq!(decoded[[0, 1, 0]], 50);
        assert_eq!(decoded, image);
    }

    #[test]
    fn interleaved_twelve_channel_export() {
        let image = Array3::from_shape_fn((2, 2, 24), |(r, c, k)| (r * 2 + c) as u16 * 100 + k as u16);
        let mut bytes = Vec::new();
        write_interleaved_sample(&mut bytes, image.view()).unwrap();

        let decoded = read_sample("twelve.tif", bytes.as_slice()).unwrap();
        assert_eq!(decoded[[1, 1, 20]], 320);
        assert_eq!(decoded[[1, 0, 8]], 208);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_sample("junk.tif", b"not a tiff").unwrap_err();
        assert!(matches!(err, PoldivError::Decode { ref filename, .. } if filename == "junk.tif"));
    }

    #[test]
    fn taxonomy_csv_has_no_header() {
        let csv = "urtica.dioica,Urtica\nplantago.lanceolata, Plantago\n";
        let table = read_taxonomy(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.genus_of("urtica.dioica"), Some("Urtica"));
        assert_eq!(table.genus_of("plantago.lanceolata"), Some("Plantago"));
    }

    #[test]
    fn names_skip_blank_lines() {
        assert_eq!(parse_names("a\n\n b \r\n"), vec!["a".to_string(), "b".to_string()]);
    }
}
