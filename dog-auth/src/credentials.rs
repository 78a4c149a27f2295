// Credential extraction from request headers.

use std::collections::HashMap;

use crate::options::HeaderOptions;

/// The three optional credential fields an inbound request may carry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub bearer: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_auth: Option<String>,
}

impl RequestCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>, tenant_auth: Option<&str>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self.tenant_auth = tenant_auth.map(str::to_string);
        self
    }

    /// Read credentials from a header map. Names match case-insensitively
    /// and blank values count as absent.
    pub fn from_headers(headers: &HashMap<String, String>, options: &HeaderOptions) -> Self {
        Self {
            bearer: header(headers, &options.authorization)
                .and_then(|v| parse_authorization(v, &options.schemes)),
            tenant_id: header(headers, &options.tenant_id).map(str::to_string),
            tenant_auth: header(headers, &options.tenant_auth).map(str::to_string),
        }
    }

    /// Tenant id supplied without a tenant secret. Empty values count as
    /// missing.
    pub fn tenant_id_without_auth(&self) -> bool {
        self.tenant_pair().0.is_some() && self.tenant_pair().1.is_none()
    }

    /// Non-empty tenant id and tenant secret, as present.
    pub fn tenant_pair(&self) -> (Option<&str>, Option<&str>) {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        (present(&self.tenant_id), present(&self.tenant_auth))
    }
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Match `<scheme> <token>` against the accepted schemes.
pub fn parse_authorization(value: &str, schemes: &[String]) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    schemes
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme.trim()))
        .then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_all_three_fields() {
        let creds = RequestCredentials::from_headers(
            &headers(&[
                ("Authorization", "Bearer abc.def.ghi"),
                ("X-SiteWhere-Tenant-Id", "t1"),
                ("X-SiteWhere-Tenant-Auth", "s1"),
            ]),
            &HeaderOptions::default(),
        );
        assert_eq!(creds.bearer.as_deref(), Some("abc.def.ghi"));
        assert_eq!(creds.tenant_id.as_deref(), Some("t1"));
        assert_eq!(creds.tenant_auth.as_deref(), Some("s1"));
        assert!(!creds.tenant_id_without_auth());
    }

    #[test]
    fn empty_secret_from_builder_counts_as_missing() {
        let creds = RequestCredentials::bearer("t").with_tenant("t1", Some(""));
        assert!(creds.tenant_id_without_auth());
        assert_eq!(creds.tenant_pair(), (Some("t1"), None));

        let creds = RequestCredentials::bearer("t").with_tenant("", Some("s1"));
        assert!(!creds.tenant_id_without_auth());
    }

    #[test]
    fn tenant_pair_borrows_from_the_credentials() {
        let creds = RequestCredentials::bearer("t").with_tenant("t1", Some("s1"));
        let (id, auth) = creds.tenant_pair();
        let joined = [id, auth].into_iter().flatten().collect::<Vec<&str>>().join(":");
        assert_eq!(joined, "t1:s1");
    }

    #[test]
    fn blank_tenant_auth_counts_as_missing() {
        let creds = RequestCredentials::from_headers(
            &headers(&[("x-sitewhere-tenant-id", "t1"), ("x-sitewhere-tenant-auth", "  ")]),
            &HeaderOptions::default(),
        );
        assert!(creds.bearer.is_none());
        assert!(creds.tenant_id_without_auth());
    }

    #[test]
    fn schemes_are_case_insensitive_and_jwt_is_accepted() {
        let schemes = HeaderOptions::default().schemes;
        assert_eq!(parse_authorization("bearer tok", &schemes).as_deref(), Some("tok"));
        assert_eq!(parse_authorization("JWT tok", &schemes).as_deref(), Some("tok"));
        assert_eq!(parse_authorization("Basic dXNlcg==", &schemes), None);
        assert_eq!(parse_authorization("Bearer ", &schemes), None);
        assert_eq!(parse_authorization("tok", &schemes), None);
    }
}
