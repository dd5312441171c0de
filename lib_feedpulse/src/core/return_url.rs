//! Return-path encoding for the `login-from` route.
//!
//! The path is percent-encoded as a single component and every `%` is then
//! replaced by `$`, so the value survives routers that decode `%` sequences in
//! parameters. `$` itself is encoded as `%24` first, so the substitution is
//! reversible.

use crate::error::NavigationError;

const SENTINEL: char = '$';

pub fn encode_return_url(path: &str) -> String {
    urlencoding::encode(path)
        .chars()
        .map(|c| if c == '%' { SENTINEL } else { c })
        .collect()
}

pub fn decode_return_url(encoded: &str) -> Result<String, NavigationError> {
    let escaped = encoded.replace(SENTINEL, "%");
    let malformed = || NavigationError::MalformedReturnUrl(encoded.to_string());

    let bytes = escaped.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(malformed());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(&escaped)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn feed_path_encoding() {
        assert_eq!(encode_return_url("/feed/all"), "$2Ffeed$2Fall");
    }

    #[test]
    fn every_escape_uses_the_sentinel() {
        let path = "/feed/search/a b?c=$";
        let encoded = encode_return_url(path);
        assert!(!encoded.contains('%'));
        assert_eq!(
            encoded.matches(SENTINEL).count(),
            urlencoding::encode(path).matches('%').count()
        );
    }

    #[rstest]
    #[case("/feed/all")]
    #[case("/feed/search/100%25 rust")]
    #[case("/settings/general?x=1&y=$2")]
    #[case("/feed/tag/ünïcödé")]
    #[case("")]
    fn decode_reverses_encode(#[case] path: &str) {
        assert_eq!(decode_return_url(&encode_return_url(path)).unwrap(), path);
    }

    #[test]
    fn literal_percent_survives() {
        let encoded = encode_return_url("/feed/50%");
        assert!(!encoded.contains('%'));
        assert_eq!(decode_return_url(&encoded).unwrap(), "/feed/50%");
    }

    #[rstest]
    #[case("$2")]
    #[case("$ZZfeed")]
    #[case("/feed$")]
    #[case("$FF")]
    fn malformed_values_are_rejected(#[case] encoded: &str) {
        assert_eq!(
            decode_return_url(encoded),
            Err(NavigationError::MalformedReturnUrl(encoded.to_string()))
        );
    }
}
