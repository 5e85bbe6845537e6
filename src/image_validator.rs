// src/image_validator.rs
use std::fmt;
use std::path::Path;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Maximum accepted decoded image size (10MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PhotoValidationError {
    pub error_type: PhotoErrorType,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub enum PhotoErrorType {
    NotADataUrl,
    WrongFormat,
    EmptyFile,
    TooLarge,
    CorruptedFile,
}

impl PhotoErrorType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotADataUrl => "PHOTO_NOT_DATA_URL",
            Self::WrongFormat => "PHOTO_WRONG_FORMAT",
            Self::EmptyFile => "PHOTO_EMPTY",
            Self::TooLarge => "PHOTO_TOO_LARGE",
            Self::CorruptedFile => "PHOTO_CORRUPTED",
        }
    }
}

impl fmt::Display for PhotoValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type.code(), self.message)
    }
}

impl std::error::Error for PhotoValidationError {}

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

pub struct PhotoValidator;

impl PhotoValidator {
    /// Validate a photo submission before any optimistic state is
    /// created: must be a PNG or JPEG base64 data URL, non-empty, within
    /// the upload size limit, with a header matching the declared type.
    pub fn validate_data_url(data_url: &str) -> Result<(), PhotoValidationError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| PhotoValidationError {
                error_type: PhotoErrorType::NotADataUrl,
                message: "Submission is not a data URL".to_string(),
                suggestion: "Encode the image as data:image/png;base64,... or data:image/jpeg;base64,...".to_string(),
            })?;

        let (mime, payload) = rest.split_once(";base64,").ok_or_else(|| PhotoValidationError {
            error_type: PhotoErrorType::NotADataUrl,
            message: "Data URL is missing the base64 payload marker".to_string(),
            suggestion: "Use the form data:<mime>;base64,<payload>".to_string(),
        })?;

        if !matches!(mime, "image/png" | "image/jpeg") {
            return Err(PhotoValidationError {
                error_type: PhotoErrorType::WrongFormat,
                message: format!("Unsupported image type: {}", mime),
                suggestion: "Please use PNG or JPEG format only".to_string(),
            });
        }

        if payload.is_empty() {
            return Err(PhotoValidationError {
                error_type: PhotoErrorType::EmptyFile,
                message: "Photo payload is empty".to_string(),
                suggestion: "Please upload a valid image file".to_string(),
            });
        }

        // Decoded size estimate: 3 bytes per 4 base64 characters.
        let approx_bytes = payload.len() / 4 * 3;
        if approx_bytes > MAX_UPLOAD_BYTES {
            return Err(PhotoValidationError {
                error_type: PhotoErrorType::TooLarge,
                message: format!(
                    "Image too large: {:.1}MB (max 10MB)",
                    approx_bytes as f64 / 1024.0 / 1024.0
                ),
                suggestion: "Please resize or compress your image and try again".to_string(),
            });
        }

        let header = Self::decode_header(payload)?;
        if header.len() < 8 {
            return Err(PhotoValidationError {
                error_type: PhotoErrorType::CorruptedFile,
                message: "Image payload too small or corrupted".to_string(),
                suggestion: "Please upload a valid image file".to_string(),
            });
        }

        match mime {
            "image/png" => Self::validate_png_header(&header),
            _ => Self::validate_jpeg_header(&header),
        }
    }

    /// Decode just enough of the base64 payload to inspect magic bytes.
    /// Slices bytes, not chars: the payload may be arbitrary user input
    /// and must fail as corrupted, never panic mid-character.
    fn decode_header(payload: &str) -> Result<Vec<u8>, PhotoValidationError> {
        let bytes = payload.as_bytes();
        let take = bytes.len().min(16);
        let take = take - take % 4;
        let prefix = if take >= 12 { &bytes[..take] } else { bytes };

        BASE64.decode(prefix).map_err(|_| PhotoValidationError {
            error_type: PhotoErrorType::CorruptedFile,
            message: "Photo payload is not valid base64".to_string(),
            suggestion: "Please re-encode and upload the image again".to_string(),
        })
    }

    fn validate_png_header(header: &[u8]) -> Result<(), PhotoValidationError> {
        if !header.starts_with(PNG_SIGNATURE) {
            if header.starts_with(JPEG_SIGNATURE) {
                return Err(PhotoValidationError {
                    error_type: PhotoErrorType::WrongFormat,
                    message: "Payload is JPEG but declared as image/png".to_string(),
                    suggestion: "Declare the data URL as image/jpeg or convert to PNG".to_string(),
                });
            }

            return Err(PhotoValidationError {
                error_type: PhotoErrorType::CorruptedFile,
                message: "Invalid PNG payload - corrupted or wrong format".to_string(),
                suggestion: "Please upload a valid PNG image".to_string(),
            });
        }
        Ok(())
    }

    fn validate_jpeg_header(header: &[u8]) -> Result<(), PhotoValidationError> {
        if !header.starts_with(JPEG_SIGNATURE) {
            if header.starts_with(PNG_SIGNATURE) {
                return Err(PhotoValidationError {
                    error_type: PhotoErrorType::WrongFormat,
                    message: "Payload is PNG but declared as image/jpeg".to_string(),
                    suggestion: "Declare the data URL as image/png or convert to JPEG".to_string(),
                });
            }

            return Err(PhotoValidationError {
                error_type: PhotoErrorType::CorruptedFile,
                message: "Invalid JPEG payload - corrupted or wrong format".to_string(),
                suggestion: "Please upload a valid JPEG image".to_string(),
            });
        }
        Ok(())
    }
}

/// Encode raw image bytes as the data URL the submission endpoint
/// expects, inferring the mime type from the file extension.
pub fn encode_data_url(file_name: &Path, bytes: &[u8]) -> Result<String> {
    let ext = file_name
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        other => anyhow::bail!("Unsupported image format: .{}", other),
    };

    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}
