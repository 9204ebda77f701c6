//! Register trace files: one command per line, `#` starts a comment.
//!
//! ```text
//! 05 01        8-bit write of $01 to $2105
//! 16 1000      16-bit write of $1000 to $2116/$2117
//! r 39         8-bit read of $2139
//! frame        render every visible line, then run vertical blank
//! vblank       vertical blank only
//! ```

use snes_ppu_core::api::SnesPpuInstance;
use snes_ppu_core::bus::PortBus;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCommand {
    Write { port: u16, value: u8 },
    Write16 { port: u16, value: u16 },
    Read { port: u16 },
    Frame,
    VBlank,
}

#[derive(Debug, Error)]
pub enum TraceParseError {
    #[error("line {line}: invalid hex number '{token}': {source}")]
    InvalidNumber {
        line: usize,
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error("line {line}: write value must be 2 or 4 hex digits, was '{token}'")]
    InvalidValueWidth { line: usize, token: String },
    #[error("line {line}: unrecognized command '{text}'")]
    UnrecognizedCommand { line: usize, text: String },
}

fn parse_hex(token: &str, line: usize) -> Result<u16, TraceParseError> {
    let digits = token.trim_start_matches('$');
    u16::from_str_radix(digits, 16).map_err(|source| TraceParseError::InvalidNumber {
        line,
        token: token.into(),
        source,
    })
}

/// Parse a whole trace. Line numbers in errors are 1-based.
///
/// # Errors
///
/// Returns an error for the first line that is not a valid command.
pub fn parse(text: &str) -> Result<Vec<TraceCommand>, TraceParseError> {
    let mut commands = Vec::new();

    for (i, raw_line) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw_line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = content.split_whitespace().collect();
        let command = match tokens.as_slice() {
            ["frame"] => TraceCommand::Frame,
            ["vblank"] => TraceCommand::VBlank,
            ["r", port] => TraceCommand::Read { port: parse_hex(port, line)? },
            [port, value] => {
                let port = parse_hex(port, line)?;
                let parsed = parse_hex(value, line)?;
                match value.trim_start_matches('$').len() {
                    1 | 2 => TraceCommand::Write { port, value: parsed as u8 },
                    3 | 4 => TraceCommand::Write16 { port, value: parsed },
                    _ => {
                        return Err(TraceParseError::InvalidValueWidth {
                            line,
                            token: (*value).into(),
                        });
                    }
                }
            }
            _ => {
                return Err(TraceParseError::UnrecognizedCommand { line, text: content.into() });
            }
        };

        commands.push(command);
    }

    Ok(commands)
}

/// Replay commands against an instance, returning the number of frames rendered
pub fn replay<B: PortBus>(instance: &mut SnesPpuInstance<B>, commands: &[TraceCommand]) -> u32 {
    let mut frames = 0;

    for &command in commands {
        match command {
            TraceCommand::Write { port, value } => instance.write_port(port, value),
            TraceCommand::Write16 { port, value } => instance.write_port_16(port, value),
            TraceCommand::Read { port } => {
                let value = instance.read_port(port);
                log::debug!("Read ${port:02X}: {value:02X}");
            }
            TraceCommand::Frame => {
                instance.render_frame();
                frames += 1;
            }
            TraceCommand::VBlank => instance.on_vertical_blank(),
        }
    }

    frames
}
