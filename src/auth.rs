use std::fmt;

use serde::{Deserialize, Serialize};

/// Jenkins API token. Never printed in full.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("Token(<empty>)")
        } else {
            f.write_str("Token(****)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let token = Token::from("11aa22bb33cc");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("11aa22bb33cc"));
        assert_eq!(rendered, "Token(****)");
    }

    #[test]
    fn test_blank_token() {
        assert!(Token::from("   ").is_blank());
        assert!(Token::default().is_blank());
        assert!(!Token::from("abc").is_blank());
    }

    #[test]
    fn test_token_serializes_transparently() {
        let yaml = serde_yaml::to_string(&Token::from("abc")).unwrap();
        assert_eq!(yaml.trim(), "abc");
    }
}
