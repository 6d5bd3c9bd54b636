//! Parsing of user entered sequences and numbers.

use crate::{InvalidInput, Sequence};

/// Parses whitespace separated numbers into a sequence with the given offset.
pub fn sequence(line: &str, offset: i64) -> Result<Sequence, InvalidInput> {
    let data = line
        .split_whitespace()
        .enumerate()
        .map(|(position, token)| {
            token.parse::<f64>().map_err(|_| InvalidInput::NotANumber {
                token: token.to_string(),
                position,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if data.is_empty() {
        return Err(InvalidInput::EmptySequence);
    }

    Ok(Sequence::new(data, offset))
}

pub fn integer<T: std::str::FromStr>(line: &str) -> Result<T, InvalidInput> {
    let trimmed = line.trim();
    trimmed
        .parse()
        .map_err(|_| InvalidInput::NotAnInteger(trimmed.to_string()))
}

/// Like [`integer`], but an empty line yields `default`.
pub fn integer_or<T: std::str::FromStr>(line: &str, default: T) -> Result<T, InvalidInput> {
    if line.trim().is_empty() {
        return Ok(default);
    }

    integer(line)
}
