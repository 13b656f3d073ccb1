// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily certifications (photo proof of diet or workout activity).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;

/// Diet certifications accepted per day.
pub const DIET_CERT_LIMIT: usize = 5;

/// Points awarded per certification (and taken back on withdraw).
pub const POINTS_PER_CERT: i64 = 10;

/// Largest accepted decoded image payload.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Certification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum CertKind {
    Diet,
    Workout,
}

impl CertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CertKind::Diet => "diet",
            CertKind::Workout => "workout",
        }
    }
}

impl std::str::FromStr for CertKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diet" => Ok(CertKind::Diet),
            "workout" => Ok(CertKind::Workout),
            other => Err(AppError::Validation(format!(
                "unknown certification kind '{other}'"
            ))),
        }
    }
}

/// A submitted certification image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    /// Also the id of the matching community post
    pub id: String,
    /// Encoded image payload
    pub image: String,
    /// Submission time (RFC3339)
    pub submitted_at: String,
}

/// Today's certification slots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certifications {
    /// At most [`DIET_CERT_LIMIT`] entries, in submission order
    pub diet: Vec<Certification>,
    /// Single slot
    pub workout: Option<Certification>,
}

impl Certifications {
    pub fn clear(&mut self) {
        self.diet.clear();
        self.workout = None;
    }

    pub fn is_empty(&self) -> bool {
        self.diet.is_empty() && self.workout.is_none()
    }

    /// Reject a submission that would exceed the slot capacity.
    pub fn check_capacity(&self, kind: CertKind) -> Result<(), AppError> {
        match kind {
            CertKind::Diet if self.diet.len() >= DIET_CERT_LIMIT => Err(AppError::Capacity(
                format!("at most {DIET_CERT_LIMIT} diet certifications per day"),
            )),
            CertKind::Workout if self.workout.is_some() => Err(AppError::Capacity(
                "workout certification already submitted today".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Store a certification. Callers check capacity first.
    pub fn insert(&mut self, kind: CertKind, cert: Certification) {
        match kind {
            CertKind::Diet => self.diet.push(cert),
            CertKind::Workout => self.workout = Some(cert),
        }
    }

    /// Remove the diet entry at `index` or the workout slot.
    ///
    /// Returns `None` when nothing matches.
    pub fn remove(&mut self, kind: CertKind, index: Option<usize>) -> Option<Certification> {
        match kind {
            CertKind::Diet => {
                let index = index?;
                (index < self.diet.len()).then(|| self.diet.remove(index))
            }
            CertKind::Workout => self.workout.take(),
        }
    }
}

/// Check that `payload` is a base64 image, optionally wrapped in a
/// `data:image/...;base64,` URL, within [`MAX_IMAGE_BYTES`].
pub fn validate_image_payload(payload: &str) -> Result<(), AppError> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::Validation("malformed data URL".to_string()))?;
            if !header.starts_with("image/") || !header.ends_with(";base64") {
                return Err(AppError::Validation(
                    "payload must be a base64 image data URL".to_string(),
                ));
            }
            data
        }
        None => payload,
    };

    // Each 4 base64 characters carry 3 bytes; reject oversize input before decoding.
    if encoded.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(AppError::Validation("image payload too large".to_string()));
    }

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| AppError::Validation(format!("invalid base64 image: {e}")))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("image payload is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation("image payload too large".to_string()));
    }

    Ok(())
}
