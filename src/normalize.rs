//! Text cleanup applied to messages before they reach the backend.
//!
//! Discord markup is rewritten with a small scanner over `<...>` tokens. Each
//! pass walks the input once and copies everything it does not recognise.
//! Passes must run in the order used by [`clean_message`]: nickname mentions
//! are canonicalised first so mention resolution sees a single form, and the
//! awoo pass runs last so it never sees raw markup.

use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::error;

/// Resolves a user id to a display name within the message's guild.
pub trait MemberLookup {
    fn display_name(&self, user_id: u64) -> Option<String>;
}

impl<F> MemberLookup for F
where
    F: Fn(u64) -> Option<String>,
{
    fn display_name(&self, user_id: u64) -> Option<String> {
        self(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `<@!ID>`
    NicknameMention(&'a str),
    /// `<@ID>`
    Mention(&'a str),
    /// `<:NAME:ID>`
    Emoji { name: &'a str, id: &'a str },
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a markup token at the start of `input`, returning it with its byte length.
fn parse_token(input: &str) -> Option<(Token<'_>, usize)> {
    let body = input.strip_prefix('<')?;
    let end = body.find('>')?;
    let inner = &body[..end];
    let len = end + 2;

    if let Some(rest) = inner.strip_prefix("@!") {
        return is_digits(rest).then_some((Token::NicknameMention(rest), len));
    }
    if let Some(rest) = inner.strip_prefix('@') {
        return is_digits(rest).then_some((Token::Mention(rest), len));
    }
    if let Some(rest) = inner.strip_prefix(':') {
        let (name, id) = rest.split_once(':')?;
        if !name.is_empty() && name.chars().all(is_word_char) && is_digits(id) {
            return Some((Token::Emoji { name, id }, len));
        }
    }
    None
}

/// Copy `input`, letting `replace` rewrite each recognised token. Returning
/// `None` keeps the token verbatim.
fn rewrite_tokens<F>(input: &str, mut replace: F) -> String
where
    F: FnMut(Token<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match parse_token(rest) {
            Some((token, len)) => {
                match replace(token) {
                    Some(replacement) => out.push_str(&replacement),
                    None => out.push_str(&rest[..len]),
                }
                rest = &rest[len..];
            }
            None => {
                out.push('<');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Rewrite `<@!ID>` nickname mentions into canonical `<@ID>` mentions.
pub fn fix_nickname_mentions(text: &str) -> String {
    rewrite_tokens(text, |token| match token {
        Token::NicknameMention(id) => Some(format!("<@{}>", id)),
        _ => None,
    })
}

/// Replace `<:NAME:ID>` custom emoji with their bare name.
pub fn resolve_emoji_tokens(text: &str) -> String {
    rewrite_tokens(text, |token| match token {
        Token::Emoji { name, .. } => Some(name.to_string()),
        _ => None,
    })
}

/// Replace `<@ID>` mentions with member display names. Ids that cannot be
/// parsed or resolved are logged and left in the text as the bare id.
pub fn resolve_mentions(text: &str, members: &dyn MemberLookup) -> String {
    rewrite_tokens(text, |token| {
        let Token::Mention(raw_id) = token else {
            return None;
        };
        let Ok(user_id) = raw_id.parse::<u64>() else {
            error!("Discord user id wasn't an integer: {}", raw_id);
            return Some(raw_id.to_string());
        };
        match members.display_name(user_id) {
            Some(name) => Some(name),
            None => {
                error!("Unable to find guild member with user_id: {}", raw_id);
                Some(raw_id.to_string())
            }
        }
    })
}

static AWOO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\ba+w+o{2,}\b").expect("awoo pattern is valid")
});

/// Collapse the many spellings of "awoo" into one.
pub fn normalize_domain_tokens(text: &str) -> String {
    AWOO.replace_all(text, "awoo").into_owned()
}

/// Full cleanup chain for text headed to the backend.
pub fn clean_message(text: &str, members: &dyn MemberLookup) -> String {
    let text = fix_nickname_mentions(text);
    let text = resolve_emoji_tokens(&text);
    let text = resolve_mentions(&text, members);
    normalize_domain_tokens(&text)
}
