use crate::errors::{KifuError, KifuResult};
use crate::tile::{Suit, Tile, TileKind, HONOR_NAMES};

const ROMANIZED_HONORS: [&str; 7] = ["to", "na", "sh", "pe", "hk", "ht", "ty"];

fn parse_error(input: &str, message: impl Into<String>) -> KifuError {
    KifuError::Parse {
        input: input.to_string(),
        message: message.into(),
    }
}

fn suit_from_letter(c: char) -> Option<Suit> {
    match c {
        'm' => Some(Suit::Man),
        'p' => Some(Suit::Pin),
        's' => Some(Suit::Sou),
        'z' => Some(Suit::Honor),
        _ => None,
    }
}

fn tile_from_digit(input: &str, digit: u8, suit: Suit) -> KifuResult<Tile> {
    if digit == 0 {
        return Tile::red_five(suit).ok_or_else(|| parse_error(input, "honors have no red variant"));
    }
    TileKind::from_suit_rank(suit, digit)
        .map(Tile::plain)
        .ok_or_else(|| parse_error(input, format!("rank {digit} out of range")))
}

/// Canonicalizes a single tile token.
///
/// Accepts `1m`..`9m` (same for `p`, `s`), `0m`/`0p`/`0s` and the mjai-style
/// `5mr` for red fives, `1z`..`7z`, the letters `E S W N P F C`, and the
/// romanized honor names `to na sh pe hk ht ty`.
pub fn parse_tile(token: &str) -> KifuResult<Tile> {
    let text = token.trim();
    if let Some(idx) = HONOR_NAMES.iter().position(|&n| n == text) {
        return tile_from_digit(token, idx as u8 + 1, Suit::Honor);
    }
    if let Some(idx) = ROMANIZED_HONORS.iter().position(|&n| n == text) {
        return tile_from_digit(token, idx as u8 + 1, Suit::Honor);
    }

    let bytes = text.as_bytes();
    let (digit, letter, red_suffix) = match bytes {
        [d, l] => (*d, *l, false),
        [d, l, b'r'] => (*d, *l, true),
        _ => return Err(parse_error(token, "unrecognised tile token")),
    };
    if !digit.is_ascii_digit() {
        return Err(parse_error(token, "expected a rank digit"));
    }
    let suit = suit_from_letter(letter as char).ok_or_else(|| parse_error(token, "unknown suit"))?;
    let rank = digit - b'0';
    if red_suffix {
        if rank != 5 {
            return Err(parse_error(token, "only fives may carry the red suffix"));
        }
        return tile_from_digit(token, 0, suit);
    }
    tile_from_digit(token, rank, suit)
}

/// Parses a comma or whitespace separated list. Empty tokens are rejected.
pub fn parse_tile_list(text: &str) -> KifuResult<Vec<Tile>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(parse_tile)
        .collect()
}

/// Parses compact notation such as `123m0p55s777z`.
pub fn parse_hand(text: &str) -> KifuResult<Vec<Tile>> {
    let mut tiles = Vec::new();
    let mut pending: Vec<u8> = Vec::new();

    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        if let Some(d) = c.to_digit(10) {
            pending.push(d as u8);
            continue;
        }
        let suit = suit_from_letter(c).ok_or_else(|| parse_error(text, format!("unexpected '{c}'")))?;
        if pending.is_empty() {
            return Err(parse_error(text, format!("suit '{c}' without ranks")));
        }
        for d in pending.drain(..) {
            tiles.push(tile_from_digit(text, d, suit)?);
        }
    }

    if !pending.is_empty() {
        return Err(parse_error(text, "pending digits without suit"));
    }
    Ok(tiles)
}
