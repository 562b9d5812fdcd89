//! The plugins that come with this crate.
//!
//! Each plugin provides a setup function turning its configuration
//! directive into a [`PluginNode`][crate::chain::PluginNode].
//! [`register_builtins`] adds all of them to a registry.

pub mod kubernetes;
pub mod log;
pub mod ready;
pub mod root;
pub mod transfer;
pub mod whoami;

use crate::base::Name;
use crate::chain::{PluginRegistry, SetupContext, SetupError};

/// Registers all plugins of this crate.
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register(root::NAME, root::setup);
    registry.register(ready::NAME, ready::setup);
    registry.register(log::NAME, log::setup);
    registry.register(transfer::NAME, transfer::setup);
    registry.register(kubernetes::NAME, kubernetes::setup);
    registry.register(whoami::NAME, whoami::setup);
}

/// Parses a list of zone names.
///
/// An empty list means the zones of the server block. Each zone must be
/// at or below one of the server block's zones.
fn parse_zones(
    plugin: &str,
    args: &[String],
    ctx: &SetupContext,
) -> Result<Vec<Name>, SetupError> {
    if args.is_empty() {
        return Ok(ctx.zones.to_vec());
    }
    args.iter()
        .map(|arg| {
            let zone = Name::new(arg).map_err(|err| {
                SetupError::new(plugin, format!("invalid zone '{arg}': {err}"))
            })?;
            if !ctx.zones.iter().any(|server| zone.ends_with(server)) {
                return Err(SetupError::new(
                    plugin,
                    format!("zone {zone} not served by this server block"),
                ));
            }
            Ok(zone)
        })
        .collect()
}
