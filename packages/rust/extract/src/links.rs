//! URL resolution and internal/external classification.

use url::Url;

/// Outcome of resolving one `href`/`src` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// Absolute URL, or the original token when it could not be resolved.
    pub url: String,
    pub internal: bool,
    /// False for `mailto:`, `tel:`, `javascript:`, `data:` and bare fragments.
    pub navigational: bool,
}

/// Classifies links against a caller-supplied domain set.
#[derive(Debug, Clone, Default)]
pub struct LinkClassifier {
    domains: Vec<String>,
}

const NON_NAVIGATIONAL_SCHEMES: [&str; 4] = ["mailto:", "tel:", "javascript:", "data:"];

impl LinkClassifier {
    pub fn new(domains: &[String]) -> Self {
        Self {
            domains: domains
                .iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Resolve `href` against `base`. Only the first whitespace-separated
    /// token is considered.
    pub fn resolve(&self, href: &str, base: Option<&Url>) -> ResolvedUrl {
        let token = href.split_whitespace().next().unwrap_or_default();
        let lower = token.to_ascii_lowercase();

        if token.starts_with('#') || NON_NAVIGATIONAL_SCHEMES.iter().any(|s| lower.starts_with(s)) {
            return ResolvedUrl {
                url: token.to_string(),
                internal: false,
                navigational: false,
            };
        }

        let resolved = match base {
            Some(base) => base.join(token),
            None => Url::parse(token),
        };

        match resolved {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let internal = url
                    .host_str()
                    .is_some_and(|host| self.is_internal_host(host, base));
                ResolvedUrl {
                    url: url.to_string(),
                    internal,
                    navigational: true,
                }
            }
            Ok(url) => ResolvedUrl {
                url: url.to_string(),
                internal: false,
                navigational: true,
            },
            Err(_) => ResolvedUrl {
                url: token.to_string(),
                internal: false,
                navigational: true,
            },
        }
    }

    fn is_internal_host(&self, host: &str, base: Option<&Url>) -> bool {
        let host = host.to_ascii_lowercase();
        if !self.domains.is_empty() {
            return self.domains.iter().any(|d| host_matches(&host, d));
        }
        // No configured domains: same site as the page.
        base.and_then(Url::host_str)
            .is_some_and(|base_host| site_of(&host) == site_of(&base_host.to_ascii_lowercase()))
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Last two labels of a host name.
fn site_of(host: &str) -> String {
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.chevrolet.ca/en/trucks/silverado-1500").expect("valid url")
    }

    fn classifier() -> LinkClassifier {
        LinkClassifier::new(&["chevrolet.ca".to_string()])
    }

    #[test]
    fn relative_links_resolve_and_are_internal() {
        let r = classifier().resolve("/en/build-and-price", Some(&base()));
        assert_eq!(r.url, "https://www.chevrolet.ca/en/build-and-price");
        assert!(r.internal);
        assert!(r.navigational);
    }

    #[test]
    fn only_first_token_is_used() {
        let r = classifier().resolve("  /x.jpg 2x ", Some(&base()));
        assert_eq!(r.url, "https://www.chevrolet.ca/x.jpg");
    }

    #[test]
    fn subdomains_are_internal_but_lookalikes_are_not() {
        let c = classifier();
        assert!(c.resolve("https://gm.chevrolet.ca/a", Some(&base())).internal);
        assert!(!c.resolve("https://notchevrolet.ca/a", Some(&base())).internal);
        assert!(!c.resolve("https://www.gmc.com/", Some(&base())).internal);
    }

    #[test]
    fn non_navigational_schemes_pass_through() {
        let c = classifier();
        for href in ["mailto:info@chevrolet.ca", "tel:18002632001", "javascript:void(0)", "#top"] {
            let r = c.resolve(href, Some(&base()));
            assert_eq!(r.url, href);
            assert!(!r.internal);
            assert!(!r.navigational);
        }
    }

    #[test]
    fn unresolvable_returns_original() {
        let r = classifier().resolve("/relative/only", None);
        assert_eq!(r.url, "/relative/only");
        assert!(!r.internal);
    }

    #[test]
    fn empty_domain_set_uses_page_site() {
        let c = LinkClassifier::default();
        assert!(c.resolve("https://gm.chevrolet.ca/x", Some(&base())).internal);
        assert!(!c.resolve("https://www.gmc.ca/x", Some(&base())).internal);
    }
}
