use anyhow::Result;
use serde::Serialize;

use rigup_lib::Platform;

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success};

#[derive(Debug, Serialize)]
struct InfoOutput {
  version: &'static str,
  supported: bool,
  os: String,
  arch: String,
  platform: Option<String>,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let detected = Platform::current();

  let info = match &detected {
    Ok(platform) => InfoOutput {
      version: env!("CARGO_PKG_VERSION"),
      supported: true,
      os: platform.os.to_string(),
      arch: platform.arch.to_string(),
      platform: Some(platform.triple()),
    },
    Err(_) => InfoOutput {
      version: env!("CARGO_PKG_VERSION"),
      supported: false,
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
      platform: None,
    },
  };

  if output.is_json() {
    return print_json(&info);
  }

  match detected {
    Ok(platform) => print_success(&format!("rigup v{} on {}", info.version, platform)),
    Err(_) => print_error("Could not detect a supported platform."),
  }
  print_stat("OS", &info.os);
  print_stat("Arch", &info.arch);

  Ok(())
}
