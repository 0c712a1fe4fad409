// SPDX-License-Identifier: GPL-3.0-only

//! Codec and encoder selection for video recording
//!
//! The configured FourCC picks the codec, and the codec fixes the container:
//!
//! | FourCC | Encoders (first available wins)          | Parser            | Container |
//! |--------|------------------------------------------|-------------------|-----------|
//! | `mp4v` | `v4l2mpeg4enc`, `avenc_mpeg4`            | `mpeg4videoparse` | `.mp4`    |
//! | `MJPG` | `v4l2jpegenc`, `jpegenc`                 | -                 | `.avi`    |
//! | `H264` | `v4l2h264enc`, `x264enc`, `openh264enc`  | `h264parse`       | `.h264`   |
//!
//! The raw H.264 file has no container, so the parser output is pinned to
//! Annex B byte-stream with SPS/PPS in-band.

use crate::constants::{VideoQuality, defaults};
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Video codecs selectable through `video.codec`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 Part 2 in MP4
    Mp4v,
    /// Motion JPEG in AVI
    Mjpeg,
    /// H.264 elementary stream
    H264,
}

impl VideoCodec {
    pub const ALL: [VideoCodec; 3] = [VideoCodec::Mp4v, VideoCodec::Mjpeg, VideoCodec::H264];

    /// Parse a FourCC, ignoring case and surrounding whitespace
    pub fn from_fourcc(fourcc: &str) -> Option<Self> {
        match fourcc.trim().to_ascii_lowercase().as_str() {
            "mp4v" | "fmp4" | "divx" | "xvid" => Some(VideoCodec::Mp4v),
            "mjpg" | "mjpeg" => Some(VideoCodec::Mjpeg),
            "h264" | "x264" | "avc1" => Some(VideoCodec::H264),
            _ => None,
        }
    }

    /// Codec for a configured FourCC, falling back to the default with a warning
    pub fn from_config(fourcc: &str) -> Self {
        Self::from_fourcc(fourcc).unwrap_or_else(|| {
            let fallback = Self::from_fourcc(defaults::VIDEO_CODEC).unwrap_or(VideoCodec::Mp4v);
            warn!(
                codec = fourcc,
                fallback = fallback.fourcc(),
                "Unknown video codec, using default"
            );
            fallback
        })
    }

    pub fn fourcc(&self) -> &'static str {
        match self {
            VideoCodec::Mp4v => "mp4v",
            VideoCodec::Mjpeg => "MJPG",
            VideoCodec::H264 => "H264",
        }
    }

    /// File extension of the container
    pub fn extension(&self) -> &'static str {
        match self {
            VideoCodec::Mp4v => "mp4",
            VideoCodec::Mjpeg => "avi",
            VideoCodec::H264 => "h264",
        }
    }

    /// Encoder elements in priority order: `(element, is_hardware)`
    pub fn encoder_candidates(&self) -> &'static [(&'static str, bool)] {
        match self {
            VideoCodec::Mp4v => &[("v4l2mpeg4enc", true), ("avenc_mpeg4", false)],
            VideoCodec::Mjpeg => &[("v4l2jpegenc", true), ("jpegenc", false)],
            VideoCodec::H264 => &[
                ("v4l2h264enc", true),
                ("x264enc", false),
                ("openh264enc", false),
            ],
        }
    }

    /// Get the parser element name (if needed)
    pub fn parser_name(&self) -> Option<&'static str> {
        match self {
            VideoCodec::Mp4v => Some("mpeg4videoparse"),
            VideoCodec::Mjpeg => None,
            VideoCodec::H264 => Some("h264parse"),
        }
    }

    /// Caps forced after the parser, for streams written without a muxer
    pub fn stream_caps(&self) -> Option<&'static str> {
        match self {
            VideoCodec::H264 => Some("video/x-h264,stream-format=byte-stream,alignment=au"),
            VideoCodec::Mp4v | VideoCodec::Mjpeg => None,
        }
    }

    /// Element chain for a recording with the given encoder, in
    /// `gst-launch-1.0` notation
    pub fn chain_description(&self, encoder: &str) -> String {
        let mut chain = vec!["appsrc", "videoconvert", encoder];
        chain.extend(self.parser_name());
        chain.extend(self.stream_caps());
        chain.extend(self.muxer_name());
        chain.push("filesink");
        chain.join(" ! ")
    }

    /// Muxer element name, `None` for a raw elementary stream
    pub fn muxer_name(&self) -> Option<&'static str> {
        match self {
            VideoCodec::Mp4v => Some("mp4mux"),
            VideoCodec::Mjpeg => Some("avimux"),
            VideoCodec::H264 => None,
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

/// Configuration for encoder selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub codec: VideoCodec,
    pub quality: VideoQuality,
    /// Frame size, used for the bitrate
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl EncoderConfig {
    /// Build from the `video` config section and the camera's frame size
    pub fn from_settings(video: &crate::config::VideoSettings, width: u32, height: u32) -> Self {
        Self {
            codec: VideoCodec::from_config(&video.codec),
            quality: video.quality,
            width,
            height,
            fps: video.fps.max(1),
        }
    }
}

/// Elements chosen for one recording
pub struct SelectedVideoEncoder {
    pub encoder: gst::Element,
    pub parser: Option<gst::Element>,
    /// Pins the stream format of a muxer-less stream
    pub capsfilter: Option<gst::Element>,
    pub muxer: Option<gst::Element>,
    pub codec: VideoCodec,
    /// Factory name of the chosen encoder
    pub element_name: &'static str,
}

/// Names of installed encoders for a codec, in priority order
pub fn available_encoders(codec: VideoCodec) -> Vec<&'static str> {
    if gst::init().is_err() {
        return Vec::new();
    }
    codec
        .encoder_candidates()
        .iter()
        .filter(|(name, _)| gst::ElementFactory::find(name).is_some())
        .map(|(name, _)| *name)
        .collect()
}

/// Create the encoder, parser and muxer for a recording
///
/// Hardware encoders are tried first. A missing parser is tolerated, a
/// missing muxer is not.
pub fn select_video_encoder(config: &EncoderConfig) -> Result<SelectedVideoEncoder, RecordingError> {
    gst::init()
        .map_err(|e| RecordingError::StartFailed(format!("Failed to initialize GStreamer: {}", e)))?;

    let codec = config.codec;
    let (encoder, element_name) = codec
        .encoder_candidates()
        .iter()
        .find_map(|(name, is_hardware)| {
            let element = gst::ElementFactory::make(name).build().ok()?;
            info!(encoder = %name, codec = %codec, hardware = is_hardware, "Selected video encoder");
            Some((element, *name))
        })
        .ok_or_else(|| {
            let names: Vec<&str> = codec.encoder_candidates().iter().map(|(n, _)| *n).collect();
            RecordingError::EncoderNotAvailable(format!(
                "no {} encoder installed (tried {})",
                codec,
                names.join(", ")
            ))
        })?;

    configure_video_encoder(&encoder, element_name, config);

    let parser = codec.parser_name().and_then(|parser_name| {
        match gst::ElementFactory::make(parser_name).build() {
            Ok(p) => {
                debug!("Created parser: {}", parser_name);
                if codec.stream_caps().is_some() {
                    // SPS/PPS before every keyframe
                    set_if_present(&p, "config-interval", "-1");
                }
                Some(p)
            }
            Err(e) => {
                warn!("Failed to create parser {}: {}", parser_name, e);
                None
            }
        }
    });

    let capsfilter = match codec.stream_caps() {
        Some(caps) => {
            let caps: gst::Caps = caps
                .parse()
                .map_err(|e| RecordingError::StartFailed(format!("Invalid caps {}: {}", caps, e)))?;
            Some(
                gst::ElementFactory::make("capsfilter")
                    .property("caps", &caps)
                    .build()
                    .map_err(|e| RecordingError::StartFailed(format!("Failed to create capsfilter: {}", e)))?,
            )
        }
        None => None,
    };

    let muxer = match codec.muxer_name() {
        Some(muxer_name) => Some(gst::ElementFactory::make(muxer_name).build().map_err(|e| {
            RecordingError::EncoderNotAvailable(format!("Failed to create muxer {}: {}", muxer_name, e))
        })?),
        None => None,
    };

    Ok(SelectedVideoEncoder {
        encoder,
        parser,
        capsfilter,
        muxer,
        codec,
        element_name,
    })
}

fn set_if_present(element: &gst::Element, property: &str, value: &str) {
    if element.has_property(property) {
        element.set_property_from_str(property, value);
    } else {
        debug!(property, "Encoder has no such property");
    }
}

/// Configure encoder based on type and quality
fn configure_video_encoder(encoder: &gst::Element, encoder_name: &str, config: &EncoderConfig) {
    let bitrate = config.quality.bitrate_kbps(config.width, config.height);

    match encoder_name {
        "x264enc" => {
            // Pi-class CPUs cannot keep up with slower presets in real time
            set_if_present(encoder, "speed-preset", "ultrafast");
            set_if_present(encoder, "tune", "zerolatency");
            set_if_present(encoder, "bitrate", &bitrate.to_string());
            debug!("Configured x264enc: bitrate={} kbps", bitrate);
        }

        "openh264enc" => {
            set_if_present(encoder, "rate-control", "bitrate");
            set_if_present(encoder, "bitrate", &(bitrate * 1000).to_string());
            set_if_present(encoder, "usage-type", "camera");
            debug!("Configured openh264enc: bitrate={} bps", bitrate * 1000);
        }

        "v4l2h264enc" | "v4l2mpeg4enc" => {
            let controls = format!("controls,video_bitrate={}", bitrate * 1000);
            set_if_present(encoder, "extra-controls", &controls);
            debug!("Configured {}: bitrate={} bps", encoder_name, bitrate * 1000);
        }

        "avenc_mpeg4" => {
            set_if_present(encoder, "bitrate", &(bitrate * 1000).to_string());
            debug!("Configured avenc_mpeg4: bitrate={} bps", bitrate * 1000);
        }

        "jpegenc" => {
            let quality = config.quality.mjpeg_quality();
            set_if_present(encoder, "quality", &quality.to_string());
            debug!("Configured jpegenc: quality={}", quality);
        }

        _ => {
            debug!(encoder = encoder_name, "Using encoder default configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_parsing_is_case_insensitive() {
        assert_eq!(VideoCodec::from_fourcc("MP4V"), Some(VideoCodec::Mp4v));
        assert_eq!(VideoCodec::from_fourcc("mjpg"), Some(VideoCodec::Mjpeg));
        assert_eq!(VideoCodec::from_fourcc(" h264 "), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::from_fourcc("VP80"), None);
    }

    #[test]
    fn test_unknown_codec_falls_back_to_default() {
        assert_eq!(VideoCodec::from_config("theora"), VideoCodec::Mp4v);
    }

    #[test]
    fn test_container_per_codec() {
        assert_eq!(VideoCodec::Mp4v.extension(), "mp4");
        assert_eq!(VideoCodec::Mjpeg.extension(), "avi");
        assert_eq!(VideoCodec::H264.extension(), "h264");
        assert_eq!(VideoCodec::H264.muxer_name(), None);
        assert_eq!(VideoCodec::Mjpeg.parser_name(), None);
    }

    #[test]
    fn test_raw_h264_is_byte_stream() {
        assert_eq!(
            VideoCodec::H264.chain_description("x264enc"),
            "appsrc ! videoconvert ! x264enc ! h264parse ! \
             video/x-h264,stream-format=byte-stream,alignment=au ! filesink"
        );
        assert_eq!(
            VideoCodec::Mp4v.chain_description("avenc_mpeg4"),
            "appsrc ! videoconvert ! avenc_mpeg4 ! mpeg4videoparse ! mp4mux ! filesink"
        );
        for codec in VideoCodec::ALL {
            assert_eq!(
                codec.stream_caps().is_some(),
                codec.muxer_name().is_none(),
                "{} needs either a muxer or pinned caps",
                codec
            );
        }
    }

    #[test]
    fn test_hardware_encoders_first() {
        for codec in VideoCodec::ALL {
            let candidates = codec.encoder_candidates();
            assert!(candidates[0].1, "{} should try hardware first", codec);
            assert!(candidates.iter().any(|(_, hw)| !hw));
        }
    }

    #[test]
    fn test_config_from_settings() {
        let video = crate::config::VideoSettings {
            codec: "MJPG".into(),
            quality: VideoQuality::Low,
            fps: 0,
        };
        let config = EncoderConfig::from_settings(&video, 640, 480);
        assert_eq!(config.codec, VideoCodec::Mjpeg);
        assert_eq!(config.fps, 1);
    }
}
