//! Channel text tokenizer

/// Characters that start a new command
const COMMAND_STARTS: &[char] = &[
    'c', 'd', 'e', 'f', 'g', 'a', 'b', 'r', 'h', 'o', '<', '>', '@', 'v', 'w', 'y', 't', 'p',
    'n', 'l', '&',
];

/// Commands that always span three characters (`$ED`, `q7F`)
const FIXED_WIDTH: &[char] = &['$', 'q'];
const FIXED_WIDTH_LEN: usize = 3;

/// One command of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Note letter, semitone accidental and raw duration specifier
    Note {
        letter: char,
        accidental: i32,
        length: String,
    },
    Rest { length: String },
    OctaveSet(i32),
    /// `>` is +1, `<` is -1
    OctaveShift(i32),
    Instrument(u32),
    Tempo(u32),
    Volume(u32),
    /// `l`: duration used by notes and rests without their own
    DefaultLength(String),
    /// Anything the interpreter ignores, kept verbatim
    Other(String),
}

impl Command {
    pub fn parse(token: &str) -> Command {
        let mut chars = token.chars();
        let Some(first) = chars.next() else {
            return Command::Other(String::new());
        };
        let rest = chars.as_str();

        match first {
            'a'..='g' => {
                let sign_len = rest.find(|c| c != '+' && c != '-').unwrap_or(rest.len());
                let (signs, length) = rest.split_at(sign_len);
                let accidental = signs
                    .chars()
                    .map(|c| if c == '+' { 1 } else { -1 })
                    .sum();
                Command::Note {
                    letter: first,
                    accidental,
                    length: length.to_string(),
                }
            }
            'r' => Command::Rest {
                length: rest.to_string(),
            },
            '>' if rest.is_empty() => Command::OctaveShift(1),
            '<' if rest.is_empty() => Command::OctaveShift(-1),
            'l' => Command::DefaultLength(rest.to_string()),
            'o' => rest
                .parse()
                .map(Command::OctaveSet)
                .unwrap_or_else(|_| Command::Other(token.to_string())),
            '@' => rest
                .parse()
                .map(Command::Instrument)
                .unwrap_or_else(|_| Command::Other(token.to_string())),
            't' => rest
                .parse()
                .map(Command::Tempo)
                .unwrap_or_else(|_| Command::Other(token.to_string())),
            'v' => rest
                .parse()
                .map(Command::Volume)
                .unwrap_or_else(|_| Command::Other(token.to_string())),
            _ => Command::Other(token.to_string()),
        }
    }
}

/// Split flat channel text into command tokens
pub fn split_commands(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if FIXED_WIDTH.contains(&c) {
            if i > start {
                tokens.push(&text[start..i]);
            }
            let mut end = i + c.len_utf8();
            for (j, d) in chars.by_ref().take(FIXED_WIDTH_LEN - 1) {
                end = j + d.len_utf8();
            }
            tokens.push(&text[i..end]);
            start = end;
        } else if COMMAND_STARTS.contains(&c) {
            if i > start {
                tokens.push(&text[start..i]);
            }
            start = i;
        }
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Tokenize and parse channel text
pub fn parse_commands(text: &str) -> Vec<Command> {
    split_commands(text).into_iter().map(Command::parse).collect()
}
