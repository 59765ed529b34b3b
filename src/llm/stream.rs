use anyhow::Result;
use std::io::BufRead;
use std::ops::ControlFlow;

/// Read a newline-delimited streaming response, handing each non-empty line to
/// `on_line` until it breaks or the stream ends.
pub fn read_stream_lines<R, F>(reader: R, mut on_line: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> Result<ControlFlow<()>>,
{
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if on_line(line)?.is_break() {
            break;
        }
    }

    Ok(())
}
