//! Master-playlist parsing and rendition selection.

use m3u8_rs::VariantStream;
use serde::{Deserialize, Serialize};

/// One alternative encoding of the same video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamVariant {
    pub bandwidth: u64,
    pub average_bandwidth: u64,
    pub codecs: String,
    /// `WIDTHxHEIGHT`
    pub resolution: String,
    pub frame_rate: f64,
    pub url: String,
}

impl StreamVariant {
    /// Accepts a variant only if it carries every attribute a rendition is
    /// chosen by and points at an absolute `http` URL.
    fn from_variant(variant: VariantStream) -> Option<Self> {
        if variant.is_i_frame || !variant.uri.starts_with("http") {
            return None;
        }
        let codecs = variant.codecs.filter(|c| !c.is_empty())?;
        let resolution = variant.resolution?;

        Some(Self {
            bandwidth: variant.bandwidth,
            average_bandwidth: variant.average_bandwidth?,
            codecs,
            resolution: format!("{}x{}", resolution.width, resolution.height),
            frame_rate: variant.frame_rate?,
            url: variant.uri,
        })
    }
}

/// Extracts every rendition of a master playlist, in manifest order.
///
/// A rendition must carry `BANDWIDTH`, `AVERAGE-BANDWIDTH`, `CODECS`,
/// `RESOLUTION` and `FRAME-RATE`; renditions missing any of them are skipped.
/// A document that is not a master playlist at all yields nothing.
pub fn parse_variants(manifest: &str) -> Vec<StreamVariant> {
    let playlist = match m3u8_rs::parse_master_playlist_res(manifest.as_bytes()) {
        Ok(playlist) => playlist,
        Err(e) => {
            tracing::warn!(error = ?e, "manifest is not a master playlist");
            return Vec::new();
        }
    };

    let listed = playlist.variants.len();
    let variants: Vec<_> = playlist
        .variants
        .into_iter()
        .filter_map(StreamVariant::from_variant)
        .collect();
    if variants.len() < listed {
        tracing::debug!(
            listed,
            kept = variants.len(),
            "skipped incomplete stream descriptions"
        );
    }
    variants
}

/// The variant with the highest bandwidth; the earliest one wins a tie.
pub fn best_quality(variants: &[StreamVariant]) -> Option<&StreamVariant> {
    variants.iter().fold(None, |best, v| match best {
        Some(b) if b.bandwidth >= v.bandwidth => Some(b),
        _ => Some(v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-STREAM-INF:BANDWIDTH=1000000,AVERAGE-BANDWIDTH=900000,CODECS=\"avc1.4d401f,mp4a.40.2\",RESOLUTION=1280x720,FRAME-RATE=29.970
https://hls.example/720/index.m3u8?token=a
#EXT-X-STREAM-INF:BANDWIDTH=2000000,AVERAGE-BANDWIDTH=1800000,CODECS=\"avc1.640028,mp4a.40.2\",RESOLUTION=1920x1080,FRAME-RATE=29.970
https://hls.example/1080/index.m3u8?token=b
";

    #[test]
    fn parses_variants_in_order() {
        let variants = parse_variants(MASTER);
        assert_eq!(
            variants,
            vec![
                StreamVariant {
                    bandwidth: 1_000_000,
                    average_bandwidth: 900_000,
                    codecs: "avc1.4d401f,mp4a.40.2".into(),
                    resolution: "1280x720".into(),
                    frame_rate: 29.97,
                    url: "https://hls.example/720/index.m3u8?token=a".into(),
                },
                StreamVariant {
                    bandwidth: 2_000_000,
                    average_bandwidth: 1_800_000,
                    codecs: "avc1.640028,mp4a.40.2".into(),
                    resolution: "1920x1080".into(),
                    frame_rate: 29.97,
                    url: "https://hls.example/1080/index.m3u8?token=b".into(),
                },
            ]
        );
    }

    #[test]
    fn best_quality_picks_highest_bandwidth() {
        let variants = parse_variants(MASTER);
        let best = best_quality(&variants).unwrap();
        assert_eq!(best.bandwidth, 2_000_000);
        assert_eq!(best.resolution, "1920x1080");
    }

    #[test]
    fn best_quality_of_nothing_is_none() {
        assert!(best_quality(&[]).is_none());
        assert!(best_quality(&parse_variants("#EXTM3U\n")).is_none());
        assert!(parse_variants("<html>maintenance</html>").is_empty());
    }

    #[test]
    fn ties_go_to_the_first_seen() {
        let manifest = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=5,AVERAGE-BANDWIDTH=5,CODECS=\"a\",RESOLUTION=1x1,FRAME-RATE=30
https://first
#EXT-X-STREAM-INF:BANDWIDTH=5,AVERAGE-BANDWIDTH=4,CODECS=\"a\",RESOLUTION=2x2,FRAME-RATE=30
https://second
";
        let variants = parse_variants(manifest);
        assert_eq!(variants.len(), 2);
        assert_eq!(best_quality(&variants).unwrap().url, "https://first");
    }

    #[test]
    fn incomplete_descriptions_are_skipped() {
        let manifest = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=100,CODECS=\"avc1\",RESOLUTION=640x360,FRAME-RATE=30
https://missing-average-bandwidth
#EXT-X-STREAM-INF:AVERAGE-BANDWIDTH=150,CODECS=\"avc1\",RESOLUTION=640x360,FRAME-RATE=30
https://missing-bandwidth
#EXT-X-STREAM-INF:BANDWIDTH=200,AVERAGE-BANDWIDTH=150,CODECS=\"avc1\",RESOLUTION=640x360
https://missing-frame-rate
#EXT-X-STREAM-INF:BANDWIDTH=300,AVERAGE-BANDWIDTH=250,CODECS=\"avc1\",RESOLUTION=854x480,FRAME-RATE=30.000
https://good
#EXT-X-STREAM-INF:BANDWIDTH=400,AVERAGE-BANDWIDTH=350,CODECS=\"avc1\",FRAME-RATE=30
https://missing-resolution
";
        let variants = parse_variants(manifest);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].bandwidth, 300);
        assert_eq!(variants[0].url, "https://good");
    }

    #[test]
    fn relative_uris_are_not_renditions() {
        let manifest = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=300,AVERAGE-BANDWIDTH=250,CODECS=\"avc1\",RESOLUTION=854x480,FRAME-RATE=30
480p/index.m3u8
";
        assert!(parse_variants(manifest).is_empty());
    }

    #[test]
    fn attribute_order_and_extra_attributes_are_tolerated() {
        let manifest = "#EXTM3U
#EXT-X-STREAM-INF:RESOLUTION=1920x1080,FRAME-RATE=59.940,CODECS=\"avc1.640028,mp4a.40.2\",AVERAGE-BANDWIDTH=5000000,BANDWIDTH=6000000,CLOSED-CAPTIONS=NONE
https://hls.example/1080p60.m3u8
";
        let variants = parse_variants(manifest);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].bandwidth, 6_000_000);
        assert_eq!(variants[0].codecs, "avc1.640028,mp4a.40.2");
        assert_eq!(variants[0].frame_rate, 59.94);
    }
}
