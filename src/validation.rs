//! Validation of domains entered on the command line.
//!
//! Matching in the overlay is exact string equality against the domain token
//! of a hosts line, so anything that could never be such a token is refused
//! before it reaches a list file.

use anyhow::Result;

use crate::error::PyholeError;

/// Longest domain name allowed in DNS, in bytes
pub const MAX_DOMAIN_LEN: usize = 253;

/// Validate a domain and return it trimmed.
///
/// # Examples
/// ```
/// use pyhole::validation::validate_domain;
/// assert_eq!(validate_domain(" ads.example.com ").unwrap(), "ads.example.com");
/// assert!(validate_domain("ads example.com").is_err());
/// assert!(validate_domain("").is_err());
/// ```
pub fn validate_domain(input: &str) -> Result<String> {
    let domain = input.trim();

    if domain.is_empty() {
        return Err(PyholeError::InvalidDomain("domain cannot be empty".into()).into());
    }

    if domain.chars().any(char::is_whitespace) {
        return Err(PyholeError::InvalidDomain(format!(
            "'{}' contains whitespace",
            domain
        ))
        .into());
    }

    if let Some(c) = domain.chars().find(|c| matches!(c, '#' | '/')) {
        return Err(PyholeError::InvalidDomain(format!(
            "'{}' contains '{}', which the hosts format cannot carry",
            domain, c
        ))
        .into());
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(PyholeError::InvalidDomain(format!(
            "'{}...' is longer than {} bytes",
            &domain[..domain.char_indices().nth(20).map_or(domain.len(), |(i, _)| i)],
            MAX_DOMAIN_LEN
        ))
        .into());
    }

    Ok(domain.to_string())
}

/// Validate every domain, stopping at the first invalid one.
pub fn validate_domains(inputs: &[String]) -> Result<Vec<String>> {
    inputs.iter().map(|d| validate_domain(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_domains() {
        assert_eq!(validate_domain("example.com").unwrap(), "example.com");
        assert_eq!(validate_domain("a").unwrap(), "a");
        assert_eq!(validate_domain("xn--bcher-kva.example").unwrap(), "xn--bcher-kva.example");
        assert_eq!(validate_domain("\tads.example.com\n").unwrap(), "ads.example.com");
    }

    #[test]
    fn test_empty() {
        assert!(validate_domain("").is_err());
        assert!(validate_domain("   ").is_err());
    }

    #[test]
    fn test_whitespace_inside() {
        let err = validate_domain("0.0.0.0 ads.example.com").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_comment_and_slash() {
        assert!(validate_domain("ads.example.com#x").is_err());
        assert!(validate_domain("ads.example.com/path").is_err());
    }

    #[test]
    fn test_length_limit() {
        let max = "a".repeat(MAX_DOMAIN_LEN);
        assert!(validate_domain(&max).is_ok());
        let over = "a".repeat(MAX_DOMAIN_LEN + 1);
        assert!(validate_domain(&over).is_err());
    }

    #[test]
    fn test_error_is_typed() {
        let err = validate_domain("").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PyholeError>(),
            Some(PyholeError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_validate_domains_stops_on_first_error() {
        let input = vec!["ok.com".to_string(), "bad domain".to_string()];
        assert!(validate_domains(&input).is_err());
        let input = vec!["ok.com".to_string(), " two.com".to_string()];
        assert_eq!(validate_domains(&input).unwrap(), vec!["ok.com", "two.com"]);
    }
}
