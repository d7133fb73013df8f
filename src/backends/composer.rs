// SPDX-License-Identifier: GPL-3.0-only

//! Source composition
//!
//! Turns a uri into a ready [`VideoInput`]. The whole decorator chain is
//! parsed and checked before any device is touched; then the terminal
//! source opens first and each decorator wraps the result, outward.

use super::input::VideoInput;
use super::registry::{DriverFactory, DriverRegistry};
use super::source::VideoSource;
use crate::config::VideoConfig;
use crate::errors::{VideoError, VideoResult};
use crate::uri::VideoUri;
use tracing::{debug, info, warn};

/// One resolved link of a decorator chain
struct ChainLink<'r> {
    uri: VideoUri,
    factory: &'r DriverFactory,
}

/// Opens uris against a driver registry
#[derive(Debug, Clone)]
pub struct Composer<'r> {
    registry: &'r DriverRegistry,
    config: VideoConfig,
}

impl<'r> Composer<'r> {
    pub fn new(registry: &'r DriverRegistry) -> Self {
        Self::with_config(registry, VideoConfig::default())
    }

    pub fn with_config(registry: &'r DriverRegistry, config: VideoConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Parse and open `uri`
    pub fn open_str(&self, uri: &str) -> VideoResult<VideoInput> {
        self.open(&VideoUri::parse(uri)?)
    }

    /// Open `uri` and wrap it in a lifecycle-checked input
    pub fn open(&self, uri: &VideoUri) -> VideoResult<VideoInput> {
        let source = self.compose(uri)?;
        Ok(VideoInput::new(uri.clone(), source))
    }

    /// Open `uri` as a bare source chain
    pub fn compose(&self, uri: &VideoUri) -> VideoResult<Box<dyn VideoSource>> {
        let mut chain = self.plan(uri)?;
        debug!(uri = %uri, depth = chain.len(), "Resolved video chain");

        let Some(terminal) = chain.pop() else {
            return Err(VideoError::malformed(&uri.to_string(), "", "empty video chain"));
        };
        let DriverFactory::Terminal(driver) = terminal.factory else {
            return Err(VideoError::malformed(
                &uri.to_string(),
                terminal.uri.scheme(),
                "chain does not end in a terminal source",
            ));
        };

        let mut source = driver
            .open(&terminal.uri, &self.config)
            .map_err(|e| open_failure(&terminal.uri, e))?;
        check_dimensions(&terminal.uri, source.as_ref())?;
        info!(
            scheme = terminal.uri.scheme(),
            width = source.width(),
            height = source.height(),
            format = %source.pixel_format(),
            "Opened video source"
        );

        // Each decorator takes ownership of the chain opened so far. If it
        // fails, the inner chain is dropped and its devices released.
        while let Some(link) = chain.pop() {
            let DriverFactory::Decorator(driver) = link.factory else {
                return Err(VideoError::malformed(
                    &uri.to_string(),
                    link.uri.scheme(),
                    "terminal source used as a decorator",
                ));
            };
            source = driver
                .open(&link.uri, source, &self.config)
                .map_err(|e| open_failure(&link.uri, e))?;
            check_dimensions(&link.uri, source.as_ref())?;
            debug!(
                scheme = link.uri.scheme(),
                format = %source.pixel_format(),
                "Applied video decorator"
            );
        }

        Ok(source)
    }

    /// Resolve every link of the chain, outermost first, without opening anything
    fn plan(&self, root: &VideoUri) -> VideoResult<Vec<ChainLink<'r>>> {
        let mut chain = Vec::new();
        let mut current = root.clone();

        loop {
            if chain.len() >= self.config.max_nesting_depth {
                return Err(VideoError::malformed(
                    &root.to_string(),
                    current.scheme(),
                    format!(
                        "decorators nested deeper than {}",
                        self.config.max_nesting_depth
                    ),
                ));
            }

            let factory = self.registry.resolve(current.scheme())?;
            if !factory.is_decorator() {
                chain.push(ChainLink { uri: current, factory });
                return Ok(chain);
            }

            let inner = current.inner()?;
            if inner == current || inner.to_string() == current.to_string() {
                return Err(VideoError::malformed(
                    &root.to_string(),
                    current.path(),
                    "decorator refers to itself",
                ));
            }
            chain.push(ChainLink { uri: current, factory });
            current = inner;
        }
    }
}

/// Open `uri` with the built-in drivers and environment configuration
pub fn open_video(uri: &str) -> VideoResult<VideoInput> {
    let config = VideoConfig::from_env()?;
    Composer::with_config(DriverRegistry::global(), config).open_str(uri)
}

/// Keep open-time errors as they are; wrap anything else with driver context
fn open_failure(uri: &VideoUri, err: VideoError) -> VideoError {
    if err.is_open_error() {
        return err;
    }
    warn!(scheme = uri.scheme(), error = %err, "Video driver failed to open");
    VideoError::DeviceOpenFailed {
        scheme: uri.scheme().to_string(),
        options: uri.options_summary(),
        reason: err.to_string(),
    }
}

fn check_dimensions(uri: &VideoUri, source: &dyn VideoSource) -> VideoResult<()> {
    if source.width() == 0 || source.height() == 0 {
        return Err(VideoError::DeviceOpenFailed {
            scheme: uri.scheme().to_string(),
            options: uri.options_summary(),
            reason: format!(
                "source reported empty frames ({}x{})",
                source.width(),
                source.height()
            ),
        });
    }
    source
        .pixel_format()
        .try_frame_size(source.width(), source.height())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let registry = DriverRegistry::with_default_drivers();
        let config = VideoConfig {
            max_nesting_depth: 2,
            ..VideoConfig::default()
        };
        let composer = Composer::with_config(&registry, config);

        assert!(composer.open_str("convert://test://").is_ok());
        let err = composer
            .open_str("convert://convert://test://")
            .unwrap_err();
        assert!(matches!(err, VideoError::MalformedUri { .. }));
    }

    #[test]
    fn test_decorator_without_inner() {
        let registry = DriverRegistry::with_default_drivers();
        let err = Composer::new(&registry).open_str("convert://").unwrap_err();
        assert!(matches!(err, VideoError::MalformedUri { .. }));
    }

    #[test]
    fn test_unknown_inner_scheme_opens_nothing() {
        let registry = DriverRegistry::with_default_drivers();
        let err = Composer::new(&registry)
            .open_str("convert:[fmt=GRAY8]//nosuch://x")
            .unwrap_err();
        assert!(matches!(err, VideoError::UnknownScheme(s) if s == "nosuch"));
    }

    #[test]
    fn test_generic_failure_mapped() {
        let mut registry = DriverRegistry::new();
        registry.register_terminal("broken", |_: &VideoUri, _: &VideoConfig| {
            Err::<Box<dyn VideoSource>, _>(VideoError::ReadFailed("no device".into()))
        });
        let err = Composer::new(&registry)
            .open_str("broken:[id=3]//x")
            .unwrap_err();
        match err {
            VideoError::DeviceOpenFailed { scheme, options, reason } => {
                assert_eq!(scheme, "broken");
                assert_eq!(options, "id=3");
                assert!(reason.contains("no device"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
