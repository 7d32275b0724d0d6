//! Cleartext layout delivered by the decryption oracle.
//!
//! Decrypted values are laid out in 32-byte words in the order their handles were requested:
//! an unsigned integer is a single big-endian word, a byte string is a head word holding the
//! offset of its tail, and the tail is a length word followed by the bytes padded to a whole
//! number of words.
use thiserror::Error;

pub const WORD: usize = 32;

/// A single decrypted value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("cleartext is {len} bytes but at least {expected} are needed")]
    TooShort { len: usize, expected: usize },

    #[error("word at byte {0} does not fit in 64 bits")]
    Overflow(usize),

    #[error("offset {0} points outside the cleartext")]
    BadOffset(u64),

    #[error("candidate name is not valid UTF-8")]
    InvalidUtf8,
}

/// Lay out the tokens as a head of one word per token followed by the tails of the byte
/// strings
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = vec![];
    let head_len = tokens.len() * WORD;

    for token in tokens {
        match token {
            Token::Uint(value) => head.extend_from_slice(&word(*value)),
            Token::Bytes(bytes) => {
                head.extend_from_slice(&word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&word(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    head.extend(tail);
    return head;
}

/// Cleartext of a vote decryption: the candidate name followed by the weight
pub fn encode_vote(candidate: &str, weight: u64) -> Vec<u8> {
    return encode(&[
        Token::Bytes(candidate.as_bytes().to_vec()),
        Token::Uint(weight),
    ]);
}

pub fn decode_vote(cleartext: &[u8]) -> Result<(String, u64), CodecError> {
    require_len(cleartext, 2 * WORD)?;
    let name = read_bytes(cleartext, 0)?;
    let weight = read_uint(cleartext, WORD)?;
    let name = String::from_utf8(name).map_err(|_| CodecError::InvalidUtf8)?;
    return Ok((name, weight));
}

/// Cleartext of a tally decryption: a single count
pub fn encode_count(count: u64) -> Vec<u8> {
    return encode(&[Token::Uint(count)]);
}

pub fn decode_count(cleartext: &[u8]) -> Result<u64, CodecError> {
    require_len(cleartext, WORD)?;
    return read_uint(cleartext, 0);
}

fn word(value: u64) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    return out;
}

fn require_len(cleartext: &[u8], expected: usize) -> Result<(), CodecError> {
    if cleartext.len() < expected {
        return Err(CodecError::TooShort {
            len: cleartext.len(),
            expected,
        });
    }
    return Ok(());
}

/// Read the word starting at byte `at` as an unsigned integer
fn read_uint(cleartext: &[u8], at: usize) -> Result<u64, CodecError> {
    let end = at.checked_add(WORD).ok_or(CodecError::BadOffset(at as u64))?;
    require_len(cleartext, end)?;
    let word = &cleartext[at..end];
    if word[..WORD - 8].iter().any(|byte| *byte != 0) {
        return Err(CodecError::Overflow(at));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    return Ok(u64::from_be_bytes(low));
}

/// Follow the offset stored in the head word at byte `at` and read the byte string it points to
fn read_bytes(cleartext: &[u8], at: usize) -> Result<Vec<u8>, CodecError> {
    let offset = read_uint(cleartext, at)?;
    let start = usize::try_from(offset).map_err(|_| CodecError::BadOffset(offset))?;
    if start.checked_add(WORD).map_or(true, |end| end > cleartext.len()) {
        return Err(CodecError::BadOffset(offset));
    }
    let len = read_uint(cleartext, start)?;
    let len_usize = usize::try_from(len).map_err(|_| CodecError::BadOffset(len))?;
    let data_start = start + WORD;
    let data_end = data_start
        .checked_add(len_usize)
        .ok_or(CodecError::BadOffset(len))?;
    require_len(cleartext, data_end)?;
    return Ok(cleartext[data_start..data_end].to_vec());
}
