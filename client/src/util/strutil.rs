//! Small string helpers ported from `str/snake_case.go` and `str/rand.go`.

use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

static ACRONYM_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Converts `CamelCase`/`mixedCase` into `lower_snake_case`.
pub fn to_lower_snake_case(input: &str) -> String {
    let step1 = ACRONYM_BOUNDARY.replace_all(input, "${1}_${2}");
    let step2 = CAMEL_BOUNDARY.replace_all(&step1, "${1}_${2}");
    step2.to_lowercase()
}

/// A random alphanumeric string of `length` characters.
pub fn random_alpha_string(length: usize) -> String {
    rand::rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_simple_camel_case() {
        assert_eq!(to_lower_snake_case("helloWorld"), "hello_world");
    }

    #[test]
    fn converts_pascal_case() {
        assert_eq!(to_lower_snake_case("HelloWorld"), "hello_world");
    }

    #[test]
    fn handles_acronym_boundaries() {
        assert_eq!(to_lower_snake_case("HTTPServer"), "http_server");
    }

    #[test]
    fn leaves_already_snake_case_alone() {
        assert_eq!(to_lower_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn random_string_has_requested_length() {
        assert_eq!(random_alpha_string(16).len(), 16);
    }

    #[test]
    fn random_string_is_alphanumeric() {
        assert!(random_alpha_string(32).chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
