// Batch publishing: authenticate once, then run the full publish sequence
// for each box in the order given. The first error ends the whole run;
// boxes released before it stay released.

use crate::api::Registry;
use crate::cli::{Args, PublishConfig};
use crate::error::PublishError;
use crate::ui::{self, UploadProgress};
use std::fs::File;
use std::io::Write;

/// Publishes every box named in a [`PublishConfig`] through a registry.
pub struct Publisher<'a, R: Registry> {
    registry: &'a R,
    config: &'a PublishConfig,
    show_progress: bool,
}

impl<'a, R: Registry> Publisher<'a, R> {
    pub fn new(registry: &'a R, config: &'a PublishConfig) -> Self {
        Publisher {
            registry,
            config,
            show_progress: true,
        }
    }

    /// Track upload progress without drawing a bar.
    pub fn hide_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Check the account is visible, then publish each box in turn.
    /// Confirmation lines are written to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<(), PublishError> {
        let user = self.registry.find_user(&self.config.username)?;
        tracing::info!(username = %user.username, boxes = self.config.boxes.len(), "publishing");

        for name in &self.config.boxes {
            self.publish_box(name)?;
            ui::print_released(out, &self.config.box_tag(name), &self.config.version)?;
        }
        Ok(())
    }

    /// Lookup, create version, attach provider, upload, release.
    pub fn publish_box(&self, name: &str) -> Result<(), PublishError> {
        let config = self.config;
        let tag = config.box_tag(name);

        let boxref = self.registry.find_box(&tag)?;
        tracing::info!(%tag, version = %config.version, "creating version");
        let version = self
            .registry
            .create_version(&boxref, &config.version, &config.description)?;
        let provider = self.registry.create_provider(&version, &config.provider)?;

        let path = config.box_path(name);
        if !path.is_file() {
            return Err(PublishError::FileNotFound { path });
        }
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        tracing::info!(path = %path.display(), bytes = len, "uploading");

        let mut progress = if self.show_progress {
            UploadProgress::new(len, &tag)
        } else {
            UploadProgress::hidden(len)
        };
        let bar = progress.bar();
        let uploaded = self.registry.upload(
            &provider,
            file,
            len,
            Box::new(move |sent| {
                progress.record(sent);
            }),
        );
        match uploaded {
            Ok(()) => ui::finish_upload(&bar),
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        }

        if !self.registry.release(&version)? {
            return Err(PublishError::Release {
                tag,
                version: config.version.clone(),
            });
        }
        Ok(())
    }
}

/// Validate `args`, then either print the `--test` summary or publish
/// through the registry returned by `connect`. `connect` is only called
/// once validation passes and test mode is off, so a dry run never reads
/// the token or touches the registry.
pub fn run<R, F, W>(args: Args, connect: F, out: &mut W) -> Result<(), PublishError>
where
    R: Registry,
    F: FnOnce() -> Result<R, PublishError>,
    W: Write,
{
    let test_mode = args.test;
    let config = args.validate()?;
    if test_mode {
        ui::print_dry_run(out, &config)?;
        return Ok(());
    }

    let registry = connect()?;
    Publisher::new(&registry, &config).run(out)
}
