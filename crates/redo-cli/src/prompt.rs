//! Single-line command fallback used when redo is invoked without arguments.

use std::io::{self, Read};

/// Word that aborts the prompt without running anything.
pub const QUIT_TOKEN: &str = "quit";

/// Read one line and split it on whitespace.
///
/// Returns `None` for an empty line, end of input, or a `quit` token.
/// `|` tokens pass through unchanged to act as stage separators.
pub fn read_command<R: Read>(reader: R) -> io::Result<Option<Vec<String>>> {
    let line = read_line(reader)?;
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    if tokens.is_empty() || tokens.iter().any(|t| t == QUIT_TOKEN) {
        return Ok(None);
    }
    Ok(Some(tokens))
}

/// Read a command line from the process's stdin.
pub fn read_command_from_stdin() -> io::Result<Option<Vec<String>>> {
    read_command(raw_stdin()?)
}

/// Read bytes up to and excluding the first newline.
///
/// Reads one byte at a time so that input past the newline stays in the
/// descriptor for the first pipeline stage.
fn read_line<R: Read>(mut reader: R) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => line.push(byte[0]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Unbuffered handle on fd 0; `std::io::stdin()` would read ahead.
#[cfg(unix)]
fn raw_stdin() -> io::Result<std::fs::File> {
    use std::os::fd::AsFd;
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    Ok(std::fs::File::from(fd))
}

#[cfg(not(unix))]
fn raw_stdin() -> io::Result<io::Stdin> {
    Ok(io::stdin())
}
