use std::fmt;

use m3u8_rs::VariantStream;

use crate::logger::LogHandle;
use crate::{GrabError, Result};

const LOG_TAG: &str = "variant";

/// One quality option of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Raw `<width>x<height>` text, if the manifest declared one.
    pub resolution: Option<String>,
    pub uri: String,
    pub bandwidth: u64,
}

impl From<&VariantStream> for Variant {
    fn from(stream: &VariantStream) -> Self {
        Self {
            resolution: stream
                .resolution
                .as_ref()
                .map(|r| format!("{}x{}", r.width, r.height)),
            uri: stream.uri.clone(),
            bandwidth: stream.bandwidth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u64,
    pub height: Option<u64>,
}

impl Resolution {
    /// Parse `<width>x<height>`. Only the width is required.
    pub fn parse(raw: &str) -> Option<Self> {
        let (width, height) = match raw.trim().split_once('x') {
            Some((w, h)) => (w, Some(h)),
            None => (raw.trim(), None),
        };
        let width = width.parse().ok()?;
        let height = height.and_then(|h| h.parse().ok());
        Some(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.height {
            Some(height) => write!(f, "{}x{}", self.width, height),
            None => write!(f, "{}", self.width),
        }
    }
}

/// Pick the variant with the greatest width.
///
/// Variants without a parseable resolution are skipped with a warning. The
/// first of several equally wide variants wins.
pub fn select_variant<'a>(variants: &'a [Variant], log: &LogHandle) -> Result<&'a Variant> {
    let mut best: Option<(u64, &Variant)> = None;

    for variant in variants {
        let Some(resolution) = variant.resolution.as_deref().and_then(Resolution::parse) else {
            log.warn(
                LOG_TAG,
                format!(
                    "skipping variant {} with unparseable resolution {:?}",
                    variant.uri,
                    variant.resolution.as_deref().unwrap_or("")
                ),
            );
            continue;
        };

        if best.is_none_or(|(width, _)| resolution.width > width) {
            best = Some((resolution.width, variant));
        }
    }

    match best {
        Some((width, variant)) => {
            log.info(
                LOG_TAG,
                format!("selected variant {} (width {width})", variant.uri),
            );
            Ok(variant)
        }
        None => Err(GrabError::NoUsableVariant {
            candidates: variants.len(),
        }),
    }
}
