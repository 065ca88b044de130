use std::io::{BufWriter, Read, Seek, Write};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use replay_api::time::SystemClock;
use replay_engine::MessageFileReader;

use crate::config::{CatArgs, Format, GlobalArgs};
use crate::error::CliError;
use crate::output;

pub fn run(global: &GlobalArgs, args: CatArgs, token: &CancellationToken) -> Result<(), CliError> {
    let mut reader = MessageFileReader::open(&args.input, args.preserve_timestamps, Arc::new(SystemClock))?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let count = dump(&mut reader, &mut out, global.format, token)?;
    out.flush()?;
    tracing::debug!(messages = count, input = %args.input.display(), "cat finished");
    Ok(())
}

/// Write every record of `reader` to `out`. Returns the number written.
///
/// Cancellation ends the output early; what was written so far stands.
pub fn dump<R: Read + Seek>(
    reader: &mut MessageFileReader<R>,
    out: &mut dyn Write,
    format: Format,
    token: &CancellationToken,
) -> Result<u64, CliError> {
    let mut count = 0;
    loop {
        let msg = match reader.read_next(token) {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) if e.is_cancelled() => {
                tracing::info!(messages = count, "interrupted");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        match format {
            Format::Json => output::write_cat_json(out, &msg)?,
            Format::Table => output::write_cat_text(out, &msg)?,
            Format::Raw => output::write_cat_raw(out, &msg)?,
        }
        count += 1;
    }
    Ok(count)
}
