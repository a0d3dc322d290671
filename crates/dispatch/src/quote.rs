/// Remove the quoted reply fallback clients prepend to a reply body.
///
/// A reply body looks like
///
/// ```text
/// > <@alice:example.org> original message
/// > second quoted line
///
/// the actual reply
/// ```
///
/// Leading `>` lines and the blank line after them are dropped; the result is
/// trimmed. Bodies without a leading quote are only trimmed.
pub fn strip_reply_fallback(body: &str) -> &str {
    if !body.starts_with('>') {
        return body.trim();
    }

    let mut rest = body;
    while rest.starts_with('>') {
        rest = match rest.split_once('\n') {
            Some((_, tail)) => tail,
            None => "",
        };
    }
    rest.trim()
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("hello", "hello")]
    #[case("  hello \n", "hello")]
    #[case("> <@alice:hs> remind me\n\nbye", "bye")]
    #[case("> <@alice:hs> line one\n> line two\n\ndelete", "delete")]
    #[case("> <@alice:hs> only a quote", "")]
    #[case("not > a quote", "not > a quote")]
    #[case("> quote\n\nfirst\n> later quote stays", "first\n> later quote stays")]
    fn strips_leading_quote_block(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(strip_reply_fallback(body), expected);
    }
}
