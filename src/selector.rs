use std::io::{self, BufRead, Write};
use tracing::debug;

pub const MAX_ATTEMPTS: usize = 3;

/// Result of one interactive choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// 1-based indices, de-duplicated in the order they were typed.
    Chosen(Vec<usize>),
    Aborted,
}

/// Keeps the whitespace-separated tokens that are integers in `1..=max_index`.
pub fn parse_indices(line: &str, max_index: usize) -> Vec<usize> {
    let mut indices = Vec::new();
    for token in line.split_whitespace() {
        let Ok(index) = token.parse::<usize>() else {
            continue;
        };
        if (1..=max_index).contains(&index) && !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices
}

fn retry_message(attempt: usize) -> &'static str {
    match attempt {
        1 => "No valid number given, try again.",
        _ => "Still nothing valid. Type numbers from the list, separated by spaces. Last try.",
    }
}

/// Prompts on `out` and reads lines from `input` until a non-empty
/// selection is made, the attempts run out or the input ends.
pub fn select<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    max_index: usize,
    prompt: &str,
) -> io::Result<Selection> {
    if max_index == 0 {
        return Ok(Selection::Aborted);
    }

    let mut line = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            writeln!(out, "{}", retry_message(attempt - 1))?;
        }
        write!(out, "{} ", prompt)?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            debug!("End of input during selection");
            return Ok(Selection::Aborted);
        }

        let indices = parse_indices(&line, max_index);
        if !indices.is_empty() {
            return Ok(Selection::Chosen(indices));
        }
    }

    writeln!(out, "Giving up after {} attempts.", MAX_ATTEMPTS)?;
    Ok(Selection::Aborted)
}

/// `select` against the process terminal.
pub fn select_from_terminal(max_index: usize, prompt: &str) -> io::Result<Selection> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    select(&mut input, &mut out, max_index, prompt)
}
