//! Correlation codes binding the browser login to the credential request.

use rand::Rng;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CODE_LEN: usize = 6;

/// Short random code generated once per login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationCode(String);

impl CorrelationCode {
    /// Generates a fresh code of six lowercase alphanumeric characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LEN)
            .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
            .collect();
        Self(code)
    }

    /// Accepts an existing code if it has the expected shape.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        (s.len() == CODE_LEN && s.bytes().all(|b| CHARSET.contains(&b)))
            .then(|| Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
