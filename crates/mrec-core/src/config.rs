//! Write-out tool configuration.
//!
//! ```toml
//! reader_name = "reader"
//! muon_writer_name = "mu_writer"
//! relic_writer_name = "relic_writer"
//! disable_precision_fit = false
//! hit_overflow = "truncate"
//!
//! [policy]
//! multi_track_goodness_ceiling = 0.4
//! precision_goodness_floor = 0.3
//! ```

use std::path::Path;

use mrec_error::{RecoError, Result};
use mrec_recon::ReconPolicy;
use serde::{Deserialize, Serialize};

use crate::merge::OverflowPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteOutConfig {
    /// Event-store reader the tool binds to.
    pub reader_name: String,
    /// Output store receiving muon rows.
    pub muon_writer_name: String,
    /// Output store receiving low-energy rows.
    pub relic_writer_name: String,
    /// Veto the precision fit for every record.
    pub disable_precision_fit: bool,
    pub hit_overflow: OverflowPolicy,
    pub policy: ReconPolicy,
}

impl Default for WriteOutConfig {
    fn default() -> Self {
        Self {
            reader_name: "reader".to_owned(),
            muon_writer_name: "mu_writer".to_owned(),
            relic_writer_name: "relic_writer".to_owned(),
            disable_precision_fit: false,
            hit_overflow: OverflowPolicy::default(),
            policy: ReconPolicy::default(),
        }
    }
}

impl WriteOutConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| RecoError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("reader_name", &self.reader_name),
            ("muon_writer_name", &self.muon_writer_name),
            ("relic_writer_name", &self.relic_writer_name),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(RecoError::Config(format!("{field} must not be empty")));
            }
        }
        if self.muon_writer_name == self.relic_writer_name {
            return Err(RecoError::Config(format!(
                "muon and relic writers must differ, both are '{}'",
                self.muon_writer_name
            )));
        }
        self.policy.validate()
    }

    /// Whether the precision fit may run at all.
    #[must_use]
    pub const fn precision_fit_enabled(&self) -> bool {
        !self.disable_precision_fit
    }
}
