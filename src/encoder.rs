//! Image encoder: raw bytes in, transport-safe [`EncodedImage`] out.
//!
//! Pure transformation, no I/O beyond draining the supplied reader.

use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::EncodeError;
use crate::types::{EncodedImage, normalize_media_type, split_data_url};

/// Media type given to bare payloads whose signature we do not know. The
/// detection backend decides whether it can decode them.
pub const UNKNOWN_IMAGE_TYPE: &str = "image/octet-stream";

/// Encodes user images, enforcing the `image/*` type and a size cap.
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    max_bytes: usize,
}

impl ImageEncoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Encode an in-memory image with its declared content type.
    pub fn encode(&self, bytes: &[u8], content_type: &str) -> Result<EncodedImage, EncodeError> {
        let media_type = normalize_media_type(content_type)?;
        self.check_size(bytes.len())?;
        EncodedImage::from_base64(&media_type, STANDARD.encode(bytes))
    }

    /// Drain `reader` and encode it. Reads at most one byte past the limit.
    pub fn encode_reader<R: Read>(
        &self,
        reader: R,
        content_type: &str,
    ) -> Result<EncodedImage, EncodeError> {
        let media_type = normalize_media_type(content_type)?;
        let mut buf = Vec::new();
        reader
            .take((self.max_bytes as u64).saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| EncodeError::Unreadable(e.to_string()))?;
        self.encode(&buf, &media_type)
    }

    /// Encode the first file of a multi-file selection. Extra files are
    /// ignored; an empty selection is rejected.
    pub fn encode_selection<'a, I>(&self, files: I) -> Result<EncodedImage, EncodeError>
    where
        I: IntoIterator<Item = (&'a [u8], &'a str)>,
    {
        let mut files = files.into_iter();
        let (bytes, content_type) = files.next().ok_or(EncodeError::NothingSelected)?;
        let ignored = files.count();
        if ignored > 0 {
            debug!(ignored, "multi-file selection truncated to first image");
        }
        self.encode(bytes, content_type)
    }

    /// Accept what a client sends over the wire: either a
    /// `data:image/...;base64,` URL or bare base64. Bare payloads get their
    /// media type from the file signature.
    pub fn from_transport(&self, image: &str) -> Result<EncodedImage, EncodeError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(EncodeError::Empty);
        }
        let encoded = match split_data_url(image) {
            Some((media_type, payload)) => EncodedImage::from_base64(media_type, payload)?,
            None if image.starts_with("data:") => {
                return Err(EncodeError::NotAnImage(
                    image.split(',').next().unwrap_or_default().to_string(),
                ));
            }
            None => {
                let bytes = STANDARD
                    .decode(image.as_bytes())
                    .map_err(|e| EncodeError::InvalidBase64(e.to_string()))?;
                let media_type = match sniff_media_type(&bytes) {
                    Ok(media_type) => media_type,
                    Err(EncodeError::NotAnImage(_)) => {
                        debug!("unrecognised signature, forwarding as {UNKNOWN_IMAGE_TYPE}");
                        UNKNOWN_IMAGE_TYPE
                    }
                    Err(err) => return Err(err),
                };
                EncodedImage::from_base64(media_type, image)?
            }
        };
        // Base64 is 4/3 of the raw size; decode only when near the limit.
        if encoded.payload().len() / 4 * 3 > self.max_bytes {
            self.check_size(encoded.decode().len())?;
        }
        Ok(encoded)
    }

    fn check_size(&self, size: usize) -> Result<(), EncodeError> {
        if size == 0 {
            return Err(EncodeError::Empty);
        }
        if size > self.max_bytes {
            return Err(EncodeError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Media type from the leading magic bytes.
pub fn sniff_media_type(bytes: &[u8]) -> Result<&'static str, EncodeError> {
    if bytes.is_empty() {
        return Err(EncodeError::Empty);
    }
    let format = image::guess_format(bytes)
        .map_err(|_| EncodeError::NotAnImage("unrecognised image signature".to_string()))?;
    Ok(format.to_mime_type())
}
