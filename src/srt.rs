//! SRT cue extraction.
//!
//! We only pull out what narration needs: index, timing and text. Styling tags and other
//! caption grammars are passed through as plain text.
//!
//! Parsing is per-block and never fatal:
//! - blocks missing required lines are skipped (logged at `debug`)
//! - blocks with a broken timing line keep their text but lose their timing (logged at `warn`)

use tracing::{debug, warn};

use crate::Error;
use crate::Result;
use crate::cue::Cue;

/// Lazily parse subtitle text into cues.
///
/// The returned iterator is finite and cheap to clone; cloning it (or calling `parse` again)
/// restarts from the first block.
pub fn parse(text: &str) -> Cues<'_> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Cues {
        rest: text,
        block_no: 0,
    }
}

/// Parse all cues, failing with [`Error::EmptyInput`] when nothing survives.
pub fn parse_all(text: &str) -> Result<Vec<Cue>> {
    let cues: Vec<Cue> = parse(text).collect();
    if cues.is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(cues)
}

/// Iterator over the cues of a subtitle document.
#[derive(Debug, Clone)]
pub struct Cues<'a> {
    rest: &'a str,
    block_no: usize,
}

impl Iterator for Cues<'_> {
    type Item = Cue;

    fn next(&mut self) -> Option<Cue> {
        loop {
            let lines = self.next_block()?;
            self.block_no += 1;

            match parse_block(self.block_no, &lines) {
                Ok(cue) => return Some(cue),
                Err(err) => debug!(error = %err, "skipping caption block"),
            }
        }
    }
}

impl<'a> Cues<'a> {
    /// Pull the next run of non-blank lines. Returns `None` at end of input.
    fn next_block(&mut self) -> Option<Vec<&'a str>> {
        let mut lines = Vec::new();

        while !self.rest.is_empty() {
            let (line, rest) = split_line(self.rest);
            self.rest = rest;

            let line = line.trim();
            if line.is_empty() {
                if lines.is_empty() {
                    continue;
                }
                break;
            }
            lines.push(line);
        }

        if lines.is_empty() { None } else { Some(lines) }
    }
}

/// Split off one line, accepting `\n`, `\r\n` and bare `\r` terminators.
fn split_line(s: &str) -> (&str, &str) {
    match s.find(['\n', '\r']) {
        Some(pos) => {
            let line = &s[..pos];
            let rest = &s[pos..];
            let rest = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .or_else(|| rest.strip_prefix('\r'))
                .unwrap_or(rest);
            (line, rest)
        }
        None => (s, ""),
    }
}

fn parse_block(block: usize, lines: &[&str]) -> Result<Cue> {
    if lines.len() < 2 {
        return Err(Error::MalformedCue {
            block,
            reason: "fewer than two lines",
        });
    }

    let index = match lines[0].parse::<u32>() {
        Ok(index) if index > 0 => index,
        _ => {
            return Err(Error::MalformedCue {
                block,
                reason: "missing positive index line",
            });
        }
    };

    let (timing, text_lines) = if lines[1].contains("-->") {
        (Some(lines[1]), &lines[2..])
    } else {
        (None, &lines[1..])
    };

    if text_lines.is_empty() {
        return Err(Error::MalformedCue {
            block,
            reason: "missing text line",
        });
    }
    let text = text_lines.join(" ");

    let Some(line) = timing else {
        return Ok(Cue::untimed(index, text));
    };

    match parse_timing_line(line) {
        Some((start, end)) => Ok(Cue::timed(index, start, end, text)),
        None => {
            let err = Error::TimingParse {
                index,
                line: line.to_owned(),
            };
            warn!(error = %err, "falling back to sequential placement");
            Ok(Cue::untimed(index, text))
        }
    }
}

/// Parse `HH:MM:SS,mmm --> HH:MM:SS,mmm` into `(start_ms, end_ms)`.
///
/// Anything after the end timestamp (cue settings) is ignored. Requires `end > start`.
pub fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once("-->")?;
    let start = parse_timestamp(start.trim())?;
    let end = parse_timestamp(end.split_whitespace().next()?)?;
    (end > start).then_some((start, end))
}

/// Parse `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) into milliseconds.
pub fn parse_timestamp(s: &str) -> Option<u64> {
    let s = s.replace(',', ".");
    let mut parts = s.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    // Absurd hour fields overflow; treat them like any other unparsable timestamp.
    hours
        .checked_mul(3_600)?
        .checked_add(minutes * 60)?
        .checked_mul(1_000)?
        .checked_add((seconds * 1_000.0).round() as u64)
}
