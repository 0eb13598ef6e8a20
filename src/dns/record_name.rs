//! Relative record name derivation.
//!
//! Every construct that writes a record into a hosted zone goes through
//! these helpers.

/// Strip surrounding whitespace and trailing dots.
pub fn normalize_domain(name: &str) -> &str {
    name.trim().trim_end_matches('.')
}

/// Record name of `fqdn` relative to `zone_name`.
///
/// - empty zone → `fqdn` unchanged
/// - `fqdn == zone` → `""` (apex)
/// - `fqdn` ends with `.{zone}` → the part before the suffix
/// - otherwise → `fqdn` unchanged (the zone does not contain the name)
///
/// Both inputs may be dot-terminated.
pub fn to_route53_record_name(fqdn: &str, zone_name: &str) -> String {
    let fqdn = normalize_domain(fqdn);
    let zone = normalize_domain(zone_name);

    if zone.is_empty() {
        return fqdn.to_string();
    }
    if fqdn == zone {
        return String::new();
    }
    let suffix = format!(".{zone}");
    match fqdn.strip_suffix(suffix.as_str()) {
        Some(relative) => relative.to_string(),
        None => fqdn.to_string(),
    }
}

/// True when `fqdn` is the zone apex or a name beneath it.
pub fn is_within_zone(fqdn: &str, zone_name: &str) -> bool {
    let fqdn = normalize_domain(fqdn);
    let zone = normalize_domain(zone_name);
    !zone.is_empty() && (fqdn == zone || fqdn.ends_with(&format!(".{zone}")))
}

/// Absolute, dot-terminated name of a record relative to `zone_name`.
pub fn qualified_record_name(relative: &str, zone_name: &str) -> String {
    let zone = normalize_domain(zone_name);
    let relative = normalize_domain(relative);
    if relative.is_empty() {
        format!("{zone}.")
    } else {
        format!("{relative}.{zone}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_subdomain() {
        assert_eq!(to_route53_record_name("app.example.com", "example.com"), "app");
        assert_eq!(
            to_route53_record_name("api.eu.example.com.", "example.com."),
            "api.eu"
        );
    }

    #[test]
    fn test_apex() {
        assert_eq!(to_route53_record_name("example.com", "example.com"), "");
        assert_eq!(to_route53_record_name("example.com.", "example.com"), "");
    }

    #[test]
    fn test_empty_zone_passes_through() {
        assert_eq!(to_route53_record_name("app.example.com.", ""), "app.example.com");
        assert_eq!(to_route53_record_name(" app.example.com ", " . "), "app.example.com");
    }

    #[test]
    fn test_unrelated_zone_passes_through() {
        assert_eq!(
            to_route53_record_name("app.other.com", "example.com"),
            "app.other.com"
        );
        // Suffix match must fall on a label boundary.
        assert_eq!(
            to_route53_record_name("myexample.com", "example.com"),
            "myexample.com"
        );
    }

    #[test]
    fn test_is_within_zone() {
        assert!(is_within_zone("app.example.com", "example.com."));
        assert!(is_within_zone("example.com", "example.com"));
        assert!(!is_within_zone("myexample.com", "example.com"));
        assert!(!is_within_zone("app.example.com", ""));
    }

    #[test]
    fn test_qualified_record_name() {
        assert_eq!(qualified_record_name("app", "example.com"), "app.example.com.");
        assert_eq!(qualified_record_name("", "example.com."), "example.com.");
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,12}"
    }

    proptest! {
        #[test]
        fn prop_equal_names_are_apex(name in label(), tld in label()) {
            let fqdn = format!("{name}.{tld}");
            prop_assert_eq!(to_route53_record_name(&fqdn, &fqdn), "");
            prop_assert_eq!(to_route53_record_name(&format!("{fqdn}."), &fqdn), "");
        }

        #[test]
        fn prop_empty_zone_is_identity(name in label(), tld in label()) {
            let fqdn = format!("{name}.{tld}");
            prop_assert_eq!(to_route53_record_name(&format!("{fqdn}."), ""), fqdn);
        }

        #[test]
        fn prop_prefix_is_recovered(host in label(), zone_a in label(), zone_b in label()) {
            let zone = format!("{zone_a}.{zone_b}");
            let fqdn = format!("{host}.{zone}");
            prop_assert_eq!(to_route53_record_name(&fqdn, &zone), host.clone());
            prop_assert_eq!(
                qualified_record_name(&to_route53_record_name(&fqdn, &zone), &zone),
                format!("{fqdn}.")
            );
        }

        #[test]
        fn prop_deterministic(fqdn in "[a-z.]{0,30}", zone in "[a-z.]{0,20}") {
            prop_assert_eq!(
                to_route53_record_name(&fqdn, &zone),
                to_route53_record_name(&fqdn, &zone)
            );
        }
    }
}
