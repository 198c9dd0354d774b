// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

pub mod schema;

pub use schema::{Config, GatewayConfig, ProxyConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid_and_local() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8080);
        assert!(!config.gateway.allow_public_bind);
        assert_eq!(config.proxy.prefix, "/proxy/");
        assert_eq!(config.proxy.max_redirects, 10);
        assert!(!config.proxy.forward_cookies);
        assert!(config.proxy.access_token.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [proxy]
            prefix = "/p/"
            forward_cookies = true
            "#,
        )
        .unwrap();

        assert_eq!(config.proxy.prefix, "/p/");
        assert!(config.proxy.forward_cookies);
        assert_eq!(config.proxy.upstream_timeout_secs, 30);
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gateway]\nport = 9191\n\n[proxy]\nmax_redirects = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.gateway.port, 9191);
        assert_eq!(config.proxy.max_redirects, 3);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.proxy.prefix, "/proxy/");
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[proxy\nprefix = ").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = Config::from_toml("[gateway]\nhost = \"0.0.0.0\"").unwrap();
        config.apply_env_overrides_with(env(&[
            ("FRAMEPROXY_HOST", "127.0.0.2"),
            ("FRAMEPROXY_PORT", "7000"),
            ("FRAMEPROXY_PREFIX", "/embed/"),
            ("FRAMEPROXY_ACCESS_TOKEN", "s3cret"),
        ]));

        assert_eq!(config.gateway.host, "127.0.0.2");
        assert_eq!(config.gateway.port, 7000);
        assert_eq!(config.proxy.prefix, "/embed/");
        assert_eq!(config.proxy.access_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn bad_env_port_is_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides_with(env(&[("FRAMEPROXY_PORT", "http"), ("FRAMEPROXY_HOST", "  ")]));
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn validate_rejects_bad_prefixes() {
        for prefix in ["proxy/", "/proxy", "/", "", "/{x}/"] {
            let mut config = Config::default();
            config.proxy.prefix = prefix.into();
            assert!(config.validate().is_err(), "{prefix:?} should be rejected");
        }
    }

    #[test]
    fn validate_rejects_zero_bounds() {
        let mut config = Config::default();
        config.proxy.max_redirects = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.proxy.upstream_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.proxy.user_agent = "bad\nagent".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn dispatcher_settings_follow_config() {
        let mut config = Config::default();
        config.proxy.upstream_timeout_secs = 5;
        config.proxy.max_redirects = 4;
        let settings = config.proxy.dispatcher_settings();
        assert_eq!(settings.upstream_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_redirects, 4);
    }
}
