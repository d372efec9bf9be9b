//! CLI command implementations.

pub mod config;
pub mod resolve;
pub mod simulate;
pub mod verify;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use viewer_assets::{AssetResolver, FsProbe};
use viewer_core::VariantCatalog;

use crate::context::Context;

/// Catalog and asset tree shared by the asset commands.
#[derive(Args)]
pub struct AssetArgs {
    /// Product catalog file (TOML or JSON).
    #[arg(long, default_value = "catalog.toml")]
    pub catalog: String,

    /// Directory served as the site root.
    #[arg(long, default_value = "public")]
    pub public_dir: String,
}

impl AssetArgs {
    /// Load the catalog and build a resolver probing the public directory.
    pub fn load(&self, ctx: &Context) -> Result<(VariantCatalog, AssetResolver)> {
        let path = ctx.resolve_path(&self.catalog);
        let catalog = VariantCatalog::load(&path)
            .with_context(|| format!("Failed to load catalog: {}", path.display()))?;

        let probe = Arc::new(FsProbe::new(ctx.resolve_path(&self.public_dir)));
        let resolver = AssetResolver::new(ctx.config.assets.clone(), &catalog, probe);
        Ok((catalog, resolver))
    }
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the resolve command.
#[derive(Args)]
pub struct ResolveArgs {
    /// Product id.
    pub product: String,

    /// Variant id (default: the product's default variant).
    pub variant: Option<String>,

    #[command(flatten)]
    pub assets: AssetArgs,
}

/// Arguments for the verify command.
#[derive(Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Only check this product.
    #[arg(short, long)]
    pub product: Option<String>,
}

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Viewers per product on the simulated page.
    #[arg(long, default_value = "1")]
    pub slots: usize,

    /// After the first load, switch every viewer through its other variants.
    #[arg(long)]
    pub cycle_variants: bool,
}
