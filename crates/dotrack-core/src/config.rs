use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};
use url::Url;

pub const DEFAULT_API_URL: &str =
  "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 =
  30;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    cfg.map.insert(
      "api.url".to_string(),
      DEFAULT_API_URL.to_string()
    );
    cfg.map.insert(
      "api.timeout".to_string(),
      DEFAULT_TIMEOUT_SECS.to_string()
    );
    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );
    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading dotrackrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no dotrackrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// `DOTRACK_API_URL` beats the rc
  /// file but not explicit flags.
  pub fn apply_env(&mut self) {
    if let Ok(url) =
      std::env::var("DOTRACK_API_URL")
      && !url.trim().is_empty()
    {
      debug!(url = %url, "api url from environment");
      self.map.insert(
        "api.url".to_string(),
        url.trim().to_string()
      );
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Strict on/off lookup; a value
  /// that is neither is an error.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid {key} setting: {v}"
          )
        })
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include already loaded; skipping");
          continue;
        }

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Validated connection settings for
/// the REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
  pub base_url: String,
  pub timeout:  Duration
}

impl ApiSettings {
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let base_url = cfg
      .get("api.url")
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      });
    let parsed = Url::parse(&base_url)
      .with_context(|| {
        format!(
          "invalid api.url: {base_url}"
        )
      })?;
    if !matches!(
      parsed.scheme(),
      "http" | "https"
    ) {
      return Err(anyhow!(
        "api.url must be http or \
         https, got {base_url}"
      ));
    }

    let timeout = match cfg
      .get("api.timeout")
    {
      | Some(raw) => {
        let secs = raw
          .trim()
          .parse::<u64>()
          .with_context(|| {
            format!(
              "invalid api.timeout: \
               {raw}"
            )
          })?;
        if secs == 0 {
          return Err(anyhow!(
            "api.timeout must be at \
             least one second"
          ));
        }
        secs
      }
      | None => DEFAULT_TIMEOUT_SECS
    };

    Ok(Self {
      base_url,
      timeout: Duration::from_secs(
        timeout
      )
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("DOTRACKRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; using defaults"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".dotrackrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
