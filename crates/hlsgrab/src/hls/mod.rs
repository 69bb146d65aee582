// HLS side of the grabber: variant selection, URL handling, playlist parsing,
// segment decryption and the run orchestration tying them together.

mod decryption;
mod grabber;
mod playlist;
mod urls;
mod variant;

pub use decryption::{DecryptOutcome, SegmentDecryptor, load_key_material};
pub use grabber::{FailureStage, GrabReport, HlsGrabber, SegmentFailure};
pub use playlist::{extract_segment_urls, parse_master};
pub use urls::{media_playlist_url, resolve_base_url, resolve_file_name};
pub use variant::{Resolution, Variant, select_variant};
