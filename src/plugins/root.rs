//! The `root` plugin.
//!
//! Sets the directory other plugins resolve relative paths against. The
//! directory may be missing at startup, it might appear later.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::base::{Request, Response};
use crate::chain::{Outcome, PluginNode, ProcessFuture, SetupContext, SetupError};
use crate::config::Directive;

pub const NAME: &str = "root";

#[derive(Debug)]
pub struct RootNode {
    path: PathBuf,
}

impl RootNode {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn setup(
    directive: &Directive,
    _ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    let [path] = directive.args.as_slice() else {
        return Err(SetupError::new(NAME, "expected exactly one path"));
    };
    let path = PathBuf::from(path);
    check_path(&path)?;
    Ok(Arc::new(RootNode { path }))
}

fn check_path(path: &Path) -> Result<(), SetupError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(plugin = NAME, "Root path does not exist: {}", path.display());
            Ok(())
        }
        Err(err) => Err(SetupError::new(
            NAME,
            format!("unable to access root path '{}': {err}", path.display()),
        )),
    }
}

impl PluginNode for RootNode {
    fn name(&self) -> &str {
        NAME
    }

    fn process<'a>(
        &'a self,
        _request: &'a Request,
        _response: &'a mut Response,
    ) -> ProcessFuture<'a> {
        Box::pin(async { Outcome::Delegate })
    }
}
