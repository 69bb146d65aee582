use m3u8_rs::{Playlist, parse_playlist_res};

use super::variant::Variant;
use crate::{GrabError, Result};

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";

/// Parse a master playlist into its variants. I-frame only streams are left
/// out since they cannot be played on their own.
///
/// m3u8-rs drops a stream whose `RESOLUTION` it cannot parse, so when the
/// typed parse comes back short the variants are rebuilt from the raw
/// `#EXT-X-STREAM-INF` lines, keeping the resolution text as written.
pub fn parse_master(bytes: &[u8]) -> Result<Vec<Variant>> {
    let typed: Vec<Variant> = match parse_playlist_res(bytes) {
        Ok(Playlist::MasterPlaylist(master)) => master
            .variants
            .iter()
            .filter(|v| !v.is_i_frame)
            .map(Variant::from)
            .collect(),
        Ok(Playlist::MediaPlaylist(_)) => {
            return Err(GrabError::playlist(
                "expected a master playlist, got a media playlist",
            ));
        }
        Err(e) => {
            return Err(GrabError::playlist(format!(
                "failed to parse master playlist: {e:?}"
            )));
        }
    };

    let raw = scan_stream_inf(&String::from_utf8_lossy(bytes));
    if raw.len() > typed.len() {
        Ok(raw)
    } else {
        Ok(typed)
    }
}

/// `#EXT-X-STREAM-INF` entries paired with the URI line that follows each.
fn scan_stream_inf(text: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    let mut lines = text.lines().map(str::trim);

    while let Some(line) = lines.next() {
        let Some(attributes) = line.strip_prefix(STREAM_INF_TAG) else {
            continue;
        };
        let Some(uri) = lines.find(|l| !l.is_empty() && !l.starts_with('#')) else {
            break;
        };

        let mut resolution = None;
        let mut bandwidth = 0;
        for (key, value) in split_attributes(attributes) {
            match key {
                "RESOLUTION" => resolution = Some(value.to_owned()),
                "BANDWIDTH" => bandwidth = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        variants.push(Variant {
            resolution,
            uri: uri.to_owned(),
            bandwidth,
        });
    }
    variants
}

/// Split an attribute list on commas outside quoted strings. Quotes are
/// stripped from values.
fn split_attributes(list: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (i, c) in list.char_indices().chain(std::iter::once((list.len(), ','))) {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                if let Some((key, value)) = list[start..i].split_once('=') {
                    pairs.push((key.trim(), value.trim().trim_matches('"')));
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs
}

/// Segment URLs of a media playlist, in playlist order.
///
/// Every trimmed line starting with `prefix` counts as a segment; tags,
/// comments and relative entries are ignored.
pub fn extract_segment_urls(text: &str, prefix: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with(prefix))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
high/index.m3u8?sig=1
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=90000,RESOLUTION=1920x1080,URI=\"iframes.m3u8\"
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:6.0,
https://cdn.example.com/seg/seg0.ts?token=abc
#EXTINF:6.0,
  https://cdn.example.com/seg/seg1.ts?token=abc
#EXTINF:6.0,
relative/seg2.ts
#EXT-X-ENDLIST
";

    #[test]
    fn parses_master_variants() {
        let variants = parse_master(MASTER.as_bytes()).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].resolution.as_deref(), Some("640x360"));
        assert_eq!(variants[1].uri, "high/index.m3u8?sig=1");
        assert_eq!(variants[1].bandwidth, 5_000_000);
    }

    #[test]
    fn keeps_variants_with_unparseable_resolution() {
        let master = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1200000,RESOLUTION=bogus,CODECS=\"avc1.4d401f,mp4a.40.2\"
broken/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
high/index.m3u8
";
        let variants = parse_master(master.as_bytes()).unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[1].resolution.as_deref(), Some("bogus"));
        assert_eq!(variants[1].uri, "broken/index.m3u8");
        assert_eq!(variants[1].bandwidth, 1_200_000);
        assert_eq!(variants[2].resolution.as_deref(), Some("1920x1080"));
    }

    #[test]
    fn splits_quoted_attribute_lists() {
        assert_eq!(
            split_attributes("BANDWIDTH=1,CODECS=\"a,b\",RESOLUTION=1x2"),
            vec![("BANDWIDTH", "1"), ("CODECS", "a,b"), ("RESOLUTION", "1x2")]
        );
    }

    #[test]
    fn media_playlist_is_not_a_master() {
        let err = parse_master(MEDIA.as_bytes()).unwrap_err();
        assert!(matches!(err, GrabError::Playlist { .. }), "{err}");
    }

    #[test]
    fn extracts_prefixed_lines_in_order() {
        let segments = extract_segment_urls(MEDIA, "https://");
        assert_eq!(
            segments,
            vec![
                "https://cdn.example.com/seg/seg0.ts?token=abc",
                "https://cdn.example.com/seg/seg1.ts?token=abc",
            ]
        );
        assert!(extract_segment_urls(MEDIA, "http://").is_empty());
        assert!(extract_segment_urls("", "https://").is_empty());
    }
}
