// SPDX-License-Identifier: GPL-3.0-only

//! Video uri grammar
//!
//! A video uri selects a driver and configures it:
//!
//! ```text
//! scheme ':' [ '[' key '=' value { ',' key '=' value } ']' ] '//' path
//! ```
//!
//! Examples:
//!
//! ```text
//! test:[size=160x120,fmt=RGB24]//
//! v4l:///dev/video0
//! convert:[fmt=RGB24]//v4l:///dev/video0
//! files:[fps=10]///home/user/seq/frame_%04d.png
//! ```
//!
//! The path is kept verbatim. Decorator drivers read their inner source from
//! it with [`VideoUri::inner`], one level at a time. Option values may not
//! contain the delimiter characters `,` `]` `[` `:` `=`; no escaping
//! convention exists, so such uris are rejected as malformed.

use crate::errors::{VideoError, VideoResult};
use crate::media::PixelFormat;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Characters that may not appear inside an option value
const RESERVED_VALUE_CHARS: &[char] = &[',', ']', '[', ':', '='];

/// Parsed video uri
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUri {
    scheme: String,
    options: HashMap<String, String>,
    path: String,
}

impl VideoUri {
    /// Create a uri programmatically
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            options: HashMap::new(),
            path: path.into(),
        }
    }

    /// Add or replace an option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Parse a uri string in a single left-to-right scan
    pub fn parse(uri: &str) -> VideoResult<Self> {
        let colon = uri
            .find(':')
            .ok_or_else(|| VideoError::malformed(uri, uri, "missing ':' after scheme"))?;

        let scheme = &uri[..colon];
        if scheme.is_empty() {
            return Err(VideoError::malformed(uri, uri, "empty scheme"));
        }
        if let Some(bad) = scheme
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.')))
        {
            return Err(VideoError::malformed(
                uri,
                scheme,
                format!("invalid character '{}' in scheme", bad),
            ));
        }

        let mut rest = &uri[colon + 1..];
        let mut options = HashMap::new();

        if let Some(block) = rest.strip_prefix('[') {
            let close = block
                .find(']')
                .ok_or_else(|| VideoError::malformed(uri, rest, "unterminated option block"))?;
            parse_options(uri, &block[..close], &mut options)?;
            rest = &block[close + 1..];
        }

        let path = rest
            .strip_prefix("//")
            .ok_or_else(|| VideoError::malformed(uri, rest, "expected '//' before path"))?;

        Ok(Self {
            scheme: scheme.to_string(),
            options,
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Resource locator or nested uri, verbatim
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Raw option value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Typed option value
    ///
    /// Returns `default` when the key is absent and `InvalidOptionValue` when
    /// it is present but does not parse as `T`.
    pub fn get<T: OptionValue>(&self, key: &str, default: T) -> VideoResult<T> {
        match self.options.get(key) {
            None => Ok(default),
            Some(raw) => T::parse_option(raw).ok_or_else(|| VideoError::InvalidOptionValue {
                key: key.to_string(),
                value: raw.clone(),
                expected: T::EXPECTED.to_string(),
            }),
        }
    }

    /// Typed option value without a default
    pub fn get_opt<T: OptionValue>(&self, key: &str) -> VideoResult<Option<T>> {
        self.options
            .get(key)
            .map(|raw| {
                T::parse_option(raw).ok_or_else(|| VideoError::InvalidOptionValue {
                    key: key.to_string(),
                    value: raw.clone(),
                    expected: T::EXPECTED.to_string(),
                })
            })
            .transpose()
    }

    /// Parse the path as the next nested uri
    pub fn inner(&self) -> VideoResult<VideoUri> {
        if self.path.is_empty() {
            return Err(VideoError::malformed(
                &self.to_string(),
                "",
                format!("'{}' requires an inner video uri", self.scheme),
            ));
        }
        VideoUri::parse(&self.path)
    }

    /// Options as sorted `key=value` pairs, for diagnostics
    pub fn options_summary(&self) -> String {
        let mut pairs: Vec<_> = self
            .options
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        pairs.join(",")
    }
}

fn parse_options(
    uri: &str,
    block: &str,
    options: &mut HashMap<String, String>,
) -> VideoResult<()> {
    if block.trim().is_empty() {
        return Ok(());
    }

    for entry in block.split(',') {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| VideoError::malformed(uri, entry, "option without '='"))?;
        let key = key.trim();
        let value = value.trim();

        if key.is_empty() {
            return Err(VideoError::malformed(uri, entry, "empty option key"));
        }
        if let Some(c) = value.chars().find(|c| RESERVED_VALUE_CHARS.contains(c)) {
            return Err(VideoError::malformed(
                uri,
                entry,
                format!("reserved character '{}' in option value", c),
            ));
        }

        // Last occurrence wins
        options.insert(key.to_string(), value.to_string());
    }
    Ok(())
}

impl std::fmt::Display for VideoUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if !self.options.is_empty() {
            write!(f, "[{}]", self.options_summary())?;
        }
        write!(f, "//{}", self.path)
    }
}

impl FromStr for VideoUri {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Types that can be read from a uri option value
pub trait OptionValue: Sized {
    /// Human-readable description used in `InvalidOptionValue`
    const EXPECTED: &'static str;

    fn parse_option(raw: &str) -> Option<Self>;
}

macro_rules! numeric_option {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl OptionValue for $ty {
                const EXPECTED: &'static str = $expected;

                fn parse_option(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }
            }
        )*
    };
}

numeric_option! {
    u32 => "an unsigned integer",
    u64 => "an unsigned integer",
    usize => "an unsigned integer",
    i32 => "an integer",
    i64 => "an integer",
}

impl OptionValue for f32 {
    const EXPECTED: &'static str = "a number";

    fn parse_option(raw: &str) -> Option<Self> {
        raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
    }
}

impl OptionValue for f64 {
    const EXPECTED: &'static str = "a number";

    fn parse_option(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl OptionValue for bool {
    const EXPECTED: &'static str = "a boolean (1/0, true/false, yes/no, on/off)";

    fn parse_option(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl OptionValue for String {
    const EXPECTED: &'static str = "a string";

    fn parse_option(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl OptionValue for PixelFormat {
    const EXPECTED: &'static str = "a pixel format name such as RGB24 or GRAY8";

    fn parse_option(raw: &str) -> Option<Self> {
        PixelFormat::from_name(raw).ok()
    }
}

impl OptionValue for ImageDim {
    const EXPECTED: &'static str = "dimensions as WIDTHxHEIGHT";

    fn parse_option(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl OptionValue for Duration {
    const EXPECTED: &'static str = "a duration in milliseconds";

    fn parse_option(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(Duration::from_millis)
    }
}

/// Frame dimensions written as `WIDTHxHEIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDim {
    pub width: u32,
    pub height: u32,
}

impl ImageDim {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl FromStr for ImageDim {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VideoError::InvalidOptionValue {
            key: "size".to_string(),
            value: s.to_string(),
            expected: ImageDim::EXPECTED.to_string(),
        };
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for ImageDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_malformed(result: VideoResult<VideoUri>) -> bool {
        matches!(result, Err(VideoError::MalformedUri { .. }))
    }

    #[test]
    fn test_parse_test_uri() {
        let uri = VideoUri::parse("test:[size=160x120,n=1,fmt=RGB24]//").unwrap();
        assert_eq!(uri.scheme(), "test");
        assert_eq!(uri.path(), "");
        assert_eq!(uri.options().len(), 3);
        assert_eq!(uri.get_str("size"), Some("160x120"));
        assert_eq!(uri.get_str("n"), Some("1"));
        assert_eq!(uri.get_str("fmt"), Some("RGB24"));
    }

    #[test]
    fn test_parse_without_options() {
        let uri = VideoUri::parse("v4l:///dev/video0").unwrap();
        assert_eq!(uri.scheme(), "v4l");
        assert_eq!(uri.path(), "/dev/video0");
        assert!(uri.options().is_empty());
    }

    #[test]
    fn test_nested_path_kept_verbatim() {
        let uri = VideoUri::parse("convert:[fmt=RGB24]//v4l:///dev/video0").unwrap();
        assert_eq!(uri.path(), "v4l:///dev/video0");
        let inner = uri.inner().unwrap();
        assert_eq!(inner.scheme(), "v4l");
        assert_eq!(inner.path(), "/dev/video0");
    }

    #[test]
    fn test_url_path() {
        let uri = VideoUri::parse("mjpeg://http://127.0.0.1/?action=stream").unwrap();
        assert_eq!(uri.scheme(), "mjpeg");
        assert_eq!(uri.path(), "http://127.0.0.1/?action=stream");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let uri = VideoUri::parse("test:[fmt=GRAY8,fmt=RGB24]//").unwrap();
        assert_eq!(uri.get_str("fmt"), Some("RGB24"));
        assert_eq!(uri.options().len(), 1);
    }

    #[test]
    fn test_empty_option_block() {
        let uri = VideoUri::parse("test:[]//").unwrap();
        assert!(uri.options().is_empty());
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(is_malformed(VideoUri::parse("test")));
        assert!(is_malformed(VideoUri::parse("://path")));
        assert!(is_malformed(VideoUri::parse("test:path")));
        assert!(is_malformed(VideoUri::parse("test:/path")));
        assert!(is_malformed(VideoUri::parse("test:[size=1x1//")));
        assert!(is_malformed(VideoUri::parse("test:[size]//")));
        assert!(is_malformed(VideoUri::parse("test:[=1]//")));
        assert!(is_malformed(VideoUri::parse("te st://")));
        assert!(is_malformed(VideoUri::parse("test:[a=1]x//")));
    }

    #[test]
    fn test_reserved_characters_in_values() {
        assert!(is_malformed(VideoUri::parse("test:[a=b:c]//")));
        assert!(is_malformed(VideoUri::parse("test:[a=b=c]//")));
        assert!(is_malformed(VideoUri::parse("test:[a=1,2]//")));
        assert!(is_malformed(VideoUri::parse("test:[a=x[y]//")));
    }

    #[test]
    fn test_malformed_reports_fragment() {
        match VideoUri::parse("test:[size=1x1//") {
            Err(VideoError::MalformedUri { fragment, .. }) => {
                assert_eq!(fragment, "[size=1x1//");
            }
            other => panic!("expected MalformedUri, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_options() {
        let uri = VideoUri::parse("test:[fps=29.97,n=3,loop=yes,size=64x48,fmt=gray8]//").unwrap();
        assert_eq!(uri.get("fps", 30.0f64).unwrap(), 29.97);
        assert_eq!(uri.get("n", 1u32).unwrap(), 3);
        assert!(uri.get("loop", false).unwrap());
        assert_eq!(uri.get("size", ImageDim::new(1, 1)).unwrap(), ImageDim::new(64, 48));
        assert_eq!(uri.get("fmt", PixelFormat::RGB24).unwrap(), PixelFormat::GRAY8);
    }

    #[test]
    fn test_missing_option_returns_default() {
        let uri = VideoUri::parse("test://").unwrap();
        assert_eq!(uri.get("scale", 1.0f32).unwrap(), 1.0);
        assert_eq!(uri.get_opt::<u32>("n").unwrap(), None);
    }

    #[test]
    fn test_unparsable_option_value() {
        let uri = VideoUri::parse("test:[n=three,size=64]//").unwrap();
        match uri.get("n", 1u32) {
            Err(VideoError::InvalidOptionValue { key, value, .. }) => {
                assert_eq!(key, "n");
                assert_eq!(value, "three");
            }
            other => panic!("expected InvalidOptionValue, got {:?}", other),
        }
        assert!(uri.get("size", ImageDim::new(1, 1)).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let text = "convert:[fmt=RGB24,b=2,a=1]//test:[size=4x4]//";
        let uri = VideoUri::parse(text).unwrap();
        let printed = uri.to_string();
        assert_eq!(printed, "convert:[a=1,b=2,fmt=RGB24]//test:[size=4x4]//");
        assert_eq!(VideoUri::parse(&printed).unwrap(), uri);
    }

    #[test]
    fn test_inner_requires_path() {
        let uri = VideoUri::parse("convert:[fmt=RGB24]//").unwrap();
        assert!(matches!(uri.inner(), Err(VideoError::MalformedUri { .. })));
    }

    #[test]
    fn test_image_dim_parse() {
        assert_eq!("640x480".parse::<ImageDim>().unwrap(), ImageDim::new(640, 480));
        assert_eq!("32X16".parse::<ImageDim>().unwrap(), ImageDim::new(32, 16));
        assert!("0x10".parse::<ImageDim>().is_err());
        assert!("640".parse::<ImageDim>().is_err());
    }
}
