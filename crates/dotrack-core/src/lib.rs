pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod render;
pub mod sanitize;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting dotrack"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_env();
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  if let Some(url) = cli.api_url {
    cfg.apply_overrides([(
      "api.url".to_string(),
      url
    )]);
  }

  let settings =
    config::ApiSettings::from_config(
      &cfg
    )
    .context(
      "invalid API settings"
    )?;

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or_default();

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(
    commands::dispatch(
      &cfg,
      &settings,
      &mut renderer,
      command
    )
  )?;

  info!("done");
  Ok(())
}
