use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::config::{Format, GlobalArgs, Profile, Settings};
use crate::error::CliError;
use crate::output;

/// What `debug config` shows: where config came from and what it resolves to.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub path: String,
    pub found: bool,
    pub profile: Option<String>,
    pub default_profile: Option<String>,
    pub brokers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_error: Option<String>,
    pub profiles: BTreeMap<String, Profile>,
}

impl ConfigReport {
    pub fn new(settings: &Settings) -> Self {
        let (brokers, broker_error) = match settings.brokers() {
            Ok(b) => (b, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        Self {
            path: settings.path.display().to_string(),
            found: settings.found,
            profile: settings.profile.clone(),
            default_profile: settings.file.default_profile.clone(),
            brokers,
            broker_error,
            profiles: settings.file.profiles.clone(),
        }
    }

    pub fn write_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let found = if self.found { "" } else { " (not found)" };
        writeln!(out, "Config file: {}{found}", self.path)?;
        writeln!(out, "Profile: {}", self.profile.as_deref().unwrap_or("-"))?;
        writeln!(out, "Default profile: {}", self.default_profile.as_deref().unwrap_or("-"))?;
        match &self.broker_error {
            Some(e) => writeln!(out, "Brokers: <unresolved: {e}>")?,
            None => writeln!(out, "Brokers: {}", self.brokers.join(", "))?,
        }
        if !self.profiles.is_empty() {
            writeln!(out, "Profiles:")?;
            for (name, p) in &self.profiles {
                writeln!(out, "  {name}: {}", p.brokers.join(", "))?;
            }
        }
        Ok(())
    }
}

pub fn config(global: &GlobalArgs) -> Result<(), CliError> {
    let settings = Settings::load(global)?;
    let report = ConfigReport::new(&settings);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match global.format {
        Format::Json => output::write_json_pretty(&mut out, &report)?,
        _ => report.write_text(&mut out)?,
    }
    Ok(())
}
