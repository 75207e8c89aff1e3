use crate::error::IngestError;
use crate::extractor::{ExtractedContent, ExtractionIssue};
use image::{GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_PAGE_TREE_DEPTH: usize = 32;
const MAX_FORM_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup into `base`, one `base` tuple per index.
    Indexed {
        base: Box<ColorSpace>,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

enum ImagePayload {
    /// Undecoded pixel samples, written straight to PNG.
    Samples {
        width: u32,
        height: u32,
        color: ColorSpace,
        bits: u8,
        /// `/Decode [1 0]` on a single-component image.
        inverted: bool,
        data: Vec<u8>,
    },
    /// An already-encoded image file that still needs converting to PNG.
    Encoded { bytes: Vec<u8>, extension: &'static str },
}

/// Page text in page order plus every embedded raster image saved as PNG.
///
/// Image files are named `{stem}_page{index}_{n}.png` with a zero-based page
/// index, so a rerun overwrites the previous output.
pub fn extract_pdf(path: &Path, image_dir: &Path) -> Result<ExtractedContent, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    let pages = document.get_pages();
    let mut content = ExtractedContent::default();

    for &page_no in pages.keys() {
        match document.extract_text(&[page_no]) {
            Ok(text) => content.text.push_str(&text),
            Err(error) => content.issues.push(ExtractionIssue::PageText {
                page: page_no.saturating_sub(1),
                reason: error.to_string(),
            }),
        }
    }

    fs::create_dir_all(image_dir)?;

    for (&page_no, &page_id) in &pages {
        let page_index = page_no.saturating_sub(1);
        for (index, stream) in page_image_streams(&document, page_id).into_iter().enumerate() {
            let payload = match decode_image(&document, stream) {
                Ok(payload) => payload,
                Err(reason) => {
                    content.issues.push(ExtractionIssue::ImageDecode {
                        page: page_index,
                        index,
                        reason,
                    });
                    continue;
                }
            };

            let base = image_dir.join(format!("{stem}_page{page_index}_{index}"));
            match save_as_png(payload, &base) {
                Ok(saved) => {
                    debug!(image = %saved.display(), "saved pdf image");
                    content.image_paths.push(saved);
                }
                Err(issue) => content.issues.push(issue),
            }
        }
    }

    Ok(content)
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = document.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = current.get(b"Resources") {
            return resolve(document, resources)?.as_dict().ok();
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }

    None
}

fn xobject_dictionary<'a>(
    document: &'a Document,
    resources: &'a Dictionary,
) -> Option<&'a Dictionary> {
    resources
        .get(b"XObject")
        .ok()
        .and_then(|xobjects| resolve(document, xobjects))
        .and_then(|xobjects| xobjects.as_dict().ok())
}

fn subtype_is(stream: &Stream, subtype: &[u8]) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == subtype)
}

/// Image XObjects of a page in resource dictionary order, descending into
/// form XObjects where they appear. Each image object is listed once.
fn page_image_streams(document: &Document, page_id: ObjectId) -> Vec<&Stream> {
    let mut images = Vec::new();
    let xobjects = page_resources(document, page_id)
        .and_then(|resources| xobject_dictionary(document, resources));
    if let Some(xobjects) = xobjects {
        collect_image_streams(document, xobjects, 0, &mut HashSet::new(), &mut images);
    }
    images
}

fn collect_image_streams<'a>(
    document: &'a Document,
    xobjects: &'a Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    images: &mut Vec<&'a Stream>,
) {
    for (_name, object) in xobjects.iter() {
        if let Object::Reference(id) = object {
            if !seen.insert(*id) {
                continue;
            }
        }
        let Some(stream) = resolve(document, object).and_then(|object| object.as_stream().ok())
        else {
            continue;
        };

        if subtype_is(stream, b"Image") {
            images.push(stream);
        } else if subtype_is(stream, b"Form") && depth < MAX_FORM_DEPTH {
            let nested = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|resources| resolve(document, resources))
                .and_then(|resources| resources.as_dict().ok())
                .and_then(|resources| xobject_dictionary(document, resources));
            if let Some(nested) = nested {
                collect_image_streams(document, nested, depth + 1, seen, images);
            }
        }
    }
}

fn stream_filters(document: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    let Some(filter) = stream
        .dict
        .get(b"Filter")
        .ok()
        .and_then(|filter| resolve(document, filter))
    else {
        return Vec::new();
    };

    match filter {
        Object::Name(name) => vec![name.clone()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| match resolve(document, item) {
                Some(Object::Name(name)) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn color_space(document: &Document, object: &Object) -> Option<ColorSpace> {
    match resolve(document, object)? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first().and_then(|family| family.as_name().ok())?;
            match family {
                b"CalGray" => Some(ColorSpace::Gray),
                b"CalRGB" | b"Lab" => Some(ColorSpace::Rgb),
                b"ICCBased" => {
                    let profile = resolve(document, items.get(1)?)?.as_stream().ok()?;
                    match profile.dict.get(b"N").ok()?.as_i64().ok()? {
                        1 => Some(ColorSpace::Gray),
                        3 => Some(ColorSpace::Rgb),
                        4 => Some(ColorSpace::Cmyk),
                        _ => None,
                    }
                }
                b"Indexed" | b"I" => indexed_color_space(document, items),
                _ => None,
            }
        }
        _ => None,
    }
}

/// `[/Indexed base hival lookup]` where `lookup` is a string or a stream.
fn indexed_color_space(document: &Document, items: &[Object]) -> Option<ColorSpace> {
    let base = color_space(document, items.get(1)?)?;
    if matches!(base, ColorSpace::Indexed { .. }) {
        return None;
    }
    let hival = usize::try_from(resolve(document, items.get(2)?)?.as_i64().ok()?).ok()?;
    let mut palette = match resolve(document, items.get(3)?)? {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) => stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone()),
        _ => return None,
    };
    palette.truncate((hival + 1) * base.components());

    Some(ColorSpace::Indexed {
        base: Box::new(base),
        palette,
    })
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    dict.get(key)
        .ok()
        .and_then(|value| value.as_i64().ok())
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| format!("missing or invalid /{}", String::from_utf8_lossy(key)))
}

fn decode_is_inverted(dict: &Dictionary) -> bool {
    let Ok(Object::Array(decode)) = dict.get(b"Decode") else {
        return false;
    };
    let bounds: Vec<f32> = decode
        .iter()
        .filter_map(|value| value.as_float().ok())
        .collect();
    bounds == [1.0, 0.0]
}

fn decode_image(document: &Document, stream: &Stream) -> Result<ImagePayload, String> {
    let filters = stream_filters(document, stream);

    let samples = match filters.as_slice() {
        [] => stream.content.clone(),
        [filter] if filter == b"FlateDecode" => stream
            .decompressed_content()
            .map_err(|error| error.to_string())?,
        [filter] if filter == b"DCTDecode" => {
            return Ok(ImagePayload::Encoded {
                bytes: stream.content.clone(),
                extension: "jpg",
            })
        }
        [filter] if filter == b"JPXDecode" => {
            return Ok(ImagePayload::Encoded {
                bytes: stream.content.clone(),
                extension: "jp2",
            })
        }
        other => {
            let names = other
                .iter()
                .map(|name| String::from_utf8_lossy(name).to_string())
                .collect::<Vec<_>>();
            return Err(format!("unsupported image filter chain {names:?}"));
        }
    };

    let is_mask = matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let (color, bits) = if is_mask {
        (ColorSpace::Gray, 1)
    } else {
        let color = stream
            .dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|space| color_space(document, space))
            .ok_or_else(|| "unsupported color space".to_string())?;
        let bits = stream
            .dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|value| value.as_i64().ok())
            .unwrap_or(8);
        (color, bits)
    };
    let bits = match bits {
        1 | 2 | 4 | 8 | 16 => bits as u8,
        other => return Err(format!("unsupported bits per component {other}")),
    };
    let inverted = color == ColorSpace::Gray && decode_is_inverted(&stream.dict);

    Ok(ImagePayload::Samples {
        width: dimension(&stream.dict, b"Width")?,
        height: dimension(&stream.dict, b"Height")?,
        color,
        bits,
        inverted,
        data: samples,
    })
}

fn save_as_png(payload: ImagePayload, base: &Path) -> Result<PathBuf, ExtractionIssue> {
    let png_path = base.with_extension("png");

    match payload {
        ImagePayload::Samples {
            width,
            height,
            color,
            bits,
            inverted,
            data,
        } => {
            let values = unpack_samples(&data, width, height, color.components(), bits)
                .map(|mut values| {
                    if inverted {
                        let max = max_sample(bits);
                        values.iter_mut().for_each(|value| *value = max - *value);
                    }
                    values
                });
            values
                .and_then(|values| write_samples(width, height, &color, bits, values, &png_path))
                .map_err(|reason| ExtractionIssue::ImageConversion {
                    image: png_path.clone(),
                    reason,
                })?;
        }
        ImagePayload::Encoded { bytes, extension } => {
            let raw_path = base.with_extension(extension);
            let conversion_issue = |reason: String| ExtractionIssue::ImageConversion {
                image: raw_path.clone(),
                reason,
            };

            fs::write(&raw_path, bytes).map_err(|error| conversion_issue(error.to_string()))?;
            image::open(&raw_path)
                .and_then(|decoded| decoded.save_with_format(&png_path, ImageFormat::Png))
                .map_err(|error| conversion_issue(error.to_string()))?;
            fs::remove_file(&raw_path).map_err(|error| conversion_issue(error.to_string()))?;
        }
    }

    Ok(png_path)
}

fn max_sample(bits: u8) -> u8 {
    if bits >= 8 {
        u8::MAX
    } else {
        (1u8 << bits) - 1
    }
}

/// One byte per sample. Rows are byte-aligned; 16-bit samples keep their
/// high byte.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    bits: u8,
) -> Result<Vec<u8>, String> {
    let per_row = width as usize * channels;
    let row_bytes = (per_row * bits as usize).div_ceil(8);
    let expected = row_bytes * height as usize;
    if data.len() < expected {
        return Err(format!(
            "image data has {} bytes, expected {expected}",
            data.len()
        ));
    }

    let mut values = Vec::with_capacity(per_row * height as usize);
    for row in data[..expected].chunks_exact(row_bytes) {
        match bits {
            8 => values.extend_from_slice(row),
            16 => values.extend(row.chunks_exact(2).map(|pair| pair[0])),
            _ => {
                let per_byte = (8 / bits) as usize;
                let mask = max_sample(bits);
                values.extend((0..per_row).map(|sample| {
                    let shift = 8 - bits * (1 + (sample % per_byte) as u8);
                    (row[sample / per_byte] >> shift) & mask
                }));
            }
        }
    }

    Ok(values)
}

fn scale_to_byte(value: u8, bits: u8) -> u8 {
    if bits >= 8 {
        value
    } else {
        (value as u16 * 255 / max_sample(bits) as u16) as u8
    }
}

fn write_samples(
    width: u32,
    height: u32,
    color: &ColorSpace,
    bits: u8,
    values: Vec<u8>,
    target: &Path,
) -> Result<(), String> {
    let (base, values) = match color {
        ColorSpace::Indexed { base, palette } => {
            let stride = base.components();
            let palette = palette.as_slice();
            let expanded = values
                .iter()
                .flat_map(move |&index| {
                    let start = index as usize * stride;
                    (start..start + stride).map(move |at| palette.get(at).copied().unwrap_or(0))
                })
                .collect::<Vec<u8>>();
            (base.as_ref(), expanded)
        }
        direct => (
            direct,
            values
                .into_iter()
                .map(|value| scale_to_byte(value, bits))
                .collect(),
        ),
    };

    let saved = match base {
        ColorSpace::Gray => GrayImage::from_raw(width, height, values)
            .ok_or_else(|| "grayscale buffer size mismatch".to_string())?
            .save_with_format(target, ImageFormat::Png),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, values)
            .ok_or_else(|| "rgb buffer size mismatch".to_string())?
            .save_with_format(target, ImageFormat::Png),
        ColorSpace::Cmyk => RgbImage::from_raw(width, height, cmyk_to_rgb(&values))
            .ok_or_else(|| "cmyk buffer size mismatch".to_string())?
            .save_with_format(target, ImageFormat::Png),
        ColorSpace::Indexed { .. } => return Err("nested indexed color space".to_string()),
    };

    saved.map_err(|error| error.to_string())
}

fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|pixel| {
            let black = 255 - pixel[3] as u16;
            let channel = |value: u8| ((255 - value as u16) * black / 255) as u8;
            [channel(pixel[0]), channel(pixel[1]), channel(pixel[2])]
        })
        .collect()
}
