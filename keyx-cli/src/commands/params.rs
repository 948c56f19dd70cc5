//! Params Commands
//!
//! Export, publish and download Diffie-Hellman parameters.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use keyx_core::{DhParameters, KeyExchangeTransport};

use crate::config::CliConfig;
use crate::display;

fn write_or_print(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
            display::success(&format!("Parameters written to {:?}", path));
        }
        None => print!("{}", String::from_utf8_lossy(bytes)),
    }
    Ok(())
}

/// Writes the built-in RFC 3526 2048-bit group as PEM.
pub fn builtin(output: Option<&Path>) -> Result<()> {
    let pem = DhParameters::rfc3526_modp_2048()
        .to_pem()
        .context("Failed to encode built-in parameters")?;
    write_or_print(output, pem.as_bytes())
}

/// Uploads a parameter file to the server.
pub fn upload(config: &CliConfig, input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;

    // Catch malformed files before they reach the server.
    let parameters = DhParameters::from_encoded(&bytes)
        .and_then(|p| p.validate().map(|_| p))
        .with_context(|| format!("{:?} does not hold valid DH parameters", input))?;

    config.transport()?.upload_parameters(&bytes)?;
    display::success(&format!(
        "Uploaded {}-bit parameters",
        parameters.modulus_len() * 8
    ));

    Ok(())
}

/// Downloads the latest parameter set.
pub fn fetch(config: &CliConfig, output: Option<&Path>) -> Result<()> {
    let bytes = config.transport()?.fetch_parameters()?;
    if DhParameters::from_encoded(&bytes).is_err() {
        display::warning("Server returned parameters that do not parse");
    }
    write_or_print(output, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_writes_valid_pem() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dh.pem");

        builtin(Some(&path)).unwrap();

        let bytes = fs::read(&path).unwrap();
        let parameters = DhParameters::from_encoded(&bytes).unwrap();
        parameters.validate().unwrap();
        assert_eq!(parameters.modulus_len(), 256);
    }
}
