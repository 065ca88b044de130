use replay_engine::info::collect_info;

use crate::config::{Format, GlobalArgs, Settings};
use crate::error::CliError;
use crate::{kafka, output};

pub async fn run(global: &GlobalArgs) -> Result<(), CliError> {
    if global.format == Format::Raw {
        return Err(CliError::config("raw output is only supported by cat"));
    }

    let settings = Settings::load(global)?;
    let brokers = settings.brokers()?;
    let connector = kafka::metadata()?;

    let info = collect_info(connector.as_ref(), &brokers).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match global.format {
        Format::Json => output::write_json_pretty(&mut out, &info)?,
        _ => output::write_info_text(&mut out, &info)?,
    }
    Ok(())
}
