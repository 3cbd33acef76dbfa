use regex::Regex;

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

pub fn validate_phone(phone: &str) -> bool {
    let re = Regex::new(r"^\+?\d{9,15}$").unwrap();
    re.is_match(phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_email() {
        assert!(validate_email("jane@example.com"));
        assert!(!validate_email("jane@example"));
        assert!(!validate_email("not-an-email"));
    }

    #[test]
    fn accepts_international_phone() {
        assert!(validate_phone("+254712345678"));
        assert!(validate_phone("0712345678"));
        assert!(!validate_phone("12ab34"));
    }
}
