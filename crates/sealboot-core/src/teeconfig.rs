//! Bounded scanner for the flat TEE configuration object.
//!
//! The config is a single JSON object whose interesting values are four
//! top-level strings. A general JSON parser is deliberately out of scope:
//! the scan is token-budgeted so an adversarial blob cannot inflate parse
//! cost, nested values are skipped rather than modelled, and oversized
//! fields are rejected instead of truncated.

use crate::error::{SealbootError, SealbootResult};

/// Hard cap on tokens (keys, values, nested container opens) scanned before
/// the blob is declared hostile.
pub const MAX_TOKENS: usize = 64;

/// Per-field byte limit. Longer values are rejected, never truncated.
pub const MAX_FIELD_LEN: usize = 256;

pub const TEE_SNP: &str = "snp";
pub const TEE_SEV: &str = "sev";

/// Parsed TEE configuration.
///
/// `tee` is kept as the raw tag; [`TeeConfig::tee_kind`] validates it at
/// dispatch time so an unrecognized tag surfaces as a hard configuration
/// error rather than a parse failure (which would invite the fallback path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeeConfig {
    pub workload_id: String,
    pub attestation_url: String,
    pub tee: String,
    pub tee_data: Option<String>,
}

/// Recognized TEE variants, deciding which secret source serves the boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeKind {
    /// SEV-SNP: passphrase released by the remote attestation service.
    Snp,
    /// Plain SEV: passphrase injected locally via the kernel secret channel.
    Sev,
}

impl TeeConfig {
    pub fn tee_kind(&self) -> SealbootResult<TeeKind> {
        match self.tee.as_str() {
            TEE_SNP => Ok(TeeKind::Snp),
            TEE_SEV => Ok(TeeKind::Sev),
            other => Err(SealbootError::InvalidConfig(format!(
                "unrecognized tee tag `{other}`"
            ))),
        }
    }
}

/// Extract the four known fields from a blob believed to hold one flat JSON
/// object.
///
/// Unknown keys and nested structures are skipped (they still count against
/// the token budget). String contents are taken verbatim between the quotes;
/// the flat format carries no escapes worth decoding.
pub fn parse_tee_config(blob: &[u8]) -> SealbootResult<TeeConfig> {
    let text = std::str::from_utf8(blob)
        .map_err(|_| malformed("config blob is not valid UTF-8"))?;
    let mut scanner = Scanner::new(text);

    scanner.skip_whitespace();
    if !scanner.eat(b'{') {
        return Err(malformed("config blob is not a JSON object"));
    }

    let mut workload_id = None;
    let mut attestation_url = None;
    let mut tee = None;
    let mut tee_data = None;

    loop {
        scanner.skip_whitespace();
        if scanner.eat(b'}') {
            break;
        }

        let key = scanner.parse_string()?;
        scanner.take_token()?;
        scanner.skip_whitespace();
        if !scanner.eat(b':') {
            return Err(malformed("expected `:` after object key"));
        }
        scanner.skip_whitespace();

        match key {
            "workload_id" => workload_id = Some(scanner.parse_field("workload_id")?),
            "attestation_url" => {
                attestation_url = Some(scanner.parse_field("attestation_url")?)
            }
            "tee" => tee = Some(scanner.parse_field("tee")?),
            "tee_data" => tee_data = Some(scanner.parse_field("tee_data")?),
            _ => scanner.skip_value()?,
        }

        scanner.skip_whitespace();
        if scanner.eat(b',') {
            continue;
        }
        if scanner.eat(b'}') {
            break;
        }
        return Err(malformed("expected `,` or `}` after object value"));
    }

    let workload_id = workload_id.ok_or_else(|| malformed("missing field `workload_id`"))?;
    let attestation_url =
        attestation_url.ok_or_else(|| malformed("missing field `attestation_url`"))?;
    let tee = tee.ok_or_else(|| malformed("missing field `tee`"))?;
    if tee == TEE_SNP && tee_data.is_none() {
        return Err(malformed("missing field `tee_data` for tee=\"snp\""));
    }

    Ok(TeeConfig {
        workload_id,
        attestation_url,
        tee,
        tee_data,
    })
}

fn malformed(message: impl Into<String>) -> SealbootError {
    SealbootError::MalformedConfig(message.into())
}

/// Byte-wise scanner over the config text. All structural characters are
/// ASCII, so byte positions never split a UTF-8 sequence.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    tokens: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            tokens: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_token(&mut self) -> SealbootResult<()> {
        self.tokens += 1;
        if self.tokens > MAX_TOKENS {
            return Err(malformed(format!("token budget of {MAX_TOKENS} exceeded")));
        }
        Ok(())
    }

    /// Return the raw contents of a double-quoted string. Escapes are only
    /// honoured for delimiting; the slice keeps them verbatim.
    fn parse_string(&mut self) -> SealbootResult<&'a str> {
        if !self.eat(b'"') {
            return Err(malformed("expected a string"));
        }
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(malformed("unterminated string")),
                Some(b'"') => {
                    let end = self.pos;
                    self.pos += 1;
                    return Ok(&self.text[start..end]);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(malformed("unterminated string escape"));
                    }
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Parse a known field value: a string within the per-field byte limit.
    fn parse_field(&mut self, name: &'static str) -> SealbootResult<String> {
        let value = self.parse_string()?;
        self.take_token()?;
        if value.len() > MAX_FIELD_LEN {
            return Err(malformed(format!(
                "field `{name}` is {} bytes, over the {MAX_FIELD_LEN}-byte limit",
                value.len()
            )));
        }
        Ok(value.to_string())
    }

    /// Skip over an uninteresting value of any shape.
    fn skip_value(&mut self) -> SealbootResult<()> {
        match self.peek() {
            None => Err(malformed("expected a value")),
            Some(b'"') => {
                self.parse_string()?;
                self.take_token()
            }
            Some(b'{') | Some(b'[') => self.skip_container(),
            Some(_) => self.skip_scalar(),
        }
    }

    fn skip_container(&mut self) -> SealbootResult<()> {
        let mut depth = 0usize;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(malformed("unterminated container value")),
                Some(b'{') | Some(b'[') => {
                    depth += 1;
                    self.pos += 1;
                    self.take_token()?;
                }
                Some(b'}') | Some(b']') => {
                    self.pos += 1;
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(b'"') => {
                    self.parse_string()?;
                    self.take_token()?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_scalar(&mut self) -> SealbootResult<()> {
        while let Some(byte) = self.peek() {
            if byte == b',' || byte == b'}' || byte == b']' || byte.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        self.take_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_json(value: serde_json::Value) -> SealbootResult<TeeConfig> {
        parse_tee_config(value.to_string().as_bytes())
    }

    #[test]
    fn parses_all_four_fields_verbatim() {
        let config = parse_json(json!({
            "workload_id": "w1",
            "attestation_url": "https://kbs.example/",
            "tee": "snp",
            "tee_data": "d1",
        }))
        .expect("well-formed config");

        assert_eq!(config.workload_id, "w1");
        assert_eq!(config.attestation_url, "https://kbs.example/");
        assert_eq!(config.tee, "snp");
        assert_eq!(config.tee_data.as_deref(), Some("d1"));
        assert_eq!(config.tee_kind().unwrap(), TeeKind::Snp);
    }

    #[test]
    fn values_are_not_trimmed() {
        let config = parse_json(json!({
            "workload_id": "  spaced  ",
            "attestation_url": "u",
            "tee": "sev",
        }))
        .expect("well-formed config");
        assert_eq!(config.workload_id, "  spaced  ");
    }

    #[test]
    fn missing_mandatory_fields_are_rejected() {
        for missing in ["workload_id", "attestation_url", "tee"] {
            let mut value = json!({
                "workload_id": "w",
                "attestation_url": "u",
                "tee": "sev",
            });
            value.as_object_mut().unwrap().remove(missing);
            let err = parse_json(value).expect_err("field is mandatory");
            match err {
                SealbootError::MalformedConfig(reason) => {
                    assert!(reason.contains(missing), "reason `{reason}` names the field")
                }
                other => panic!("unexpected error variant: {other:?}"),
            }
        }
    }

    #[test]
    fn snp_requires_tee_data() {
        let err = parse_json(json!({
            "workload_id": "w",
            "attestation_url": "u",
            "tee": "snp",
        }))
        .expect_err("tee_data is mandatory under snp");
        assert!(matches!(err, SealbootError::MalformedConfig(_)));
    }

    #[test]
    fn sev_does_not_require_tee_data() {
        let config = parse_json(json!({
            "workload_id": "w",
            "attestation_url": "u",
            "tee": "sev",
        }))
        .expect("sev config without tee_data is valid");
        assert_eq!(config.tee_data, None);
        assert_eq!(config.tee_kind().unwrap(), TeeKind::Sev);
    }

    #[test]
    fn unrecognized_tee_tag_fails_at_dispatch_not_parse() {
        let config = parse_json(json!({
            "workload_id": "w",
            "attestation_url": "u",
            "tee": "bogus",
        }))
        .expect("unknown tag still parses");
        let err = config.tee_kind().expect_err("dispatch must reject it");
        assert!(matches!(err, SealbootError::InvalidConfig(_)), "got {err:?}");
    }

    #[test]
    fn nested_structures_are_ignored() {
        let config = parse_json(json!({
            "metadata": {"nested": {"deep": [1, 2, 3]}},
            "workload_id": "w",
            "extra": [true, null, "x"],
            "attestation_url": "u",
            "tee": "sev",
            "count": 7,
        }))
        .expect("nested values are skipped, not rejected");
        assert_eq!(config.workload_id, "w");
    }

    #[test]
    fn token_budget_bounds_adversarial_input() {
        let mut body = String::from("{");
        for i in 0..100 {
            body.push_str(&format!("\"k{i}\":{i},"));
        }
        body.push_str("\"tee\":\"sev\"}");

        let err = parse_tee_config(body.as_bytes()).expect_err("budget must trip");
        match err {
            SealbootError::MalformedConfig(reason) => {
                assert!(reason.contains("token budget"), "got `{reason}`")
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn oversized_field_is_rejected_not_truncated() {
        let long = "x".repeat(MAX_FIELD_LEN + 1);
        let err = parse_json(json!({
            "workload_id": long,
            "attestation_url": "u",
            "tee": "sev",
        }))
        .expect_err("oversized field must be rejected");
        match err {
            SealbootError::MalformedConfig(reason) => {
                assert!(reason.contains("workload_id"), "got `{reason}`")
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn non_object_input_is_rejected() {
        for blob in [&b"[1,2,3]"[..], &b"\"just a string\""[..], &b""[..], &b"   42"[..]] {
            let err = parse_tee_config(blob).expect_err("only objects are accepted");
            assert!(matches!(err, SealbootError::MalformedConfig(_)));
        }
    }

    #[test]
    fn non_utf8_input_is_rejected() {
        let err = parse_tee_config(&[0xff, 0xfe, b'{']).expect_err("not UTF-8");
        assert!(matches!(err, SealbootError::MalformedConfig(_)));
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let blob = br#"{"workload_id":"first","workload_id":"second","attestation_url":"u","tee":"sev"}"#;
        let config = parse_tee_config(blob).expect("duplicates are tolerated");
        assert_eq!(config.workload_id, "second");
    }
}
