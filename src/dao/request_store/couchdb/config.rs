use super::error::{CouchDaoError, CouchResult};

const BASE_URL_ENV: &str = "COUCH_BASE_URL";
const DATABASE_ENV: &str = "COUCH_DB";
const USERNAME_ENV: &str = "COUCH_USERNAME";
const PASSWORD_ENV: &str = "COUCH_PASSWORD";

/// Where the queue database lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root without trailing slash, e.g. `http://localhost:5984`.
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Basic-auth credentials sent with every request.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional credential pair.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(CouchDaoError::MissingEnvVar { var })
        };
        let config = Self::new(required(BASE_URL_ENV)?, required(DATABASE_ENV)?);

        // credentials only count as a pair
        Ok(match (lookup(USERNAME_ENV), lookup(PASSWORD_ENV)) {
            (Some(username), Some(password)) => config.with_credentials(username, password),
            _ => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn trailing_slash_is_dropped_and_credentials_need_both_halves() {
        let config = CouchConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, "http://couch:5984/"),
            (DATABASE_ENV, "karaoke"),
            (USERNAME_ENV, "admin"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://couch:5984");
        assert!(config.username.is_none());
    }

    #[test]
    fn blank_database_is_missing() {
        let err = CouchConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, "http://couch:5984"),
            (DATABASE_ENV, "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, CouchDaoError::MissingEnvVar { var: DATABASE_ENV }));
    }
}
