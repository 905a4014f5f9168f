//! Tests for [`IronMqConfig`], [`AllowList`] and [`OAuthToken`].

use super::*;

mod oauth_token_tests {
    use super::*;

    /// Verify that Debug output never contains the token value.
    #[test]
    fn test_debug_redacts_value() {
        let token = OAuthToken::new("super-secret-token");
        let debug_output = format!("{:?}", token);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
    }

    #[test]
    fn test_whitespace_token_is_empty() {
        assert!(OAuthToken::new("  ").is_empty());
        assert!(!OAuthToken::new("abc").is_empty());
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = IronMqConfig::new("super-secret-token", "project");
        let debug_output = format!("{:?}", config);

        assert!(!debug_output.contains("super-secret-token"));
        assert!(debug_output.contains("project"));
    }
}

mod allow_list_tests {
    use super::*;

    #[test]
    fn test_comma_separated_entries_are_trimmed() {
        let list = AllowList::from_comma_separated(" orders ,invoices,  ").unwrap();

        assert_eq!(list.len(), 2);
        assert!(list.contains("orders"));
        assert!(list.contains("invoices"));
        assert!(!list.contains(" orders "));
    }

    #[test]
    fn test_empty_string_gives_empty_list() {
        let list = AllowList::from_comma_separated("").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_duplicates_collapse_and_order_is_kept() {
        let list = AllowList::from_comma_separated("b,a,b").unwrap();
        let names: Vec<&str> = list.iter().map(|q| q.as_str()).collect();

        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        assert!(AllowList::from_comma_separated("orders,bad/name").is_err());
    }

    #[test]
    fn test_membership_is_exact() {
        let list = AllowList::from_comma_separated("orders").unwrap();

        assert!(list.contains("orders"));
        assert!(!list.contains("Orders"));
        assert!(!list.contains("order"));
    }

    #[test]
    fn test_resolve_against_listing_drops_unknown_queues() {
        let list = AllowList::from_comma_separated("orders,ghost,invoices").unwrap();
        let listing = vec![
            QueueSummary {
                name: "invoices".to_string(),
                size: None,
            },
            QueueSummary {
                name: "orders".to_string(),
                size: Some(3),
            },
        ];

        let resolved = list.resolve_against(&listing);
        let names: Vec<&str> = resolved.iter().map(|q| q.as_str()).collect();

        assert_eq!(names, vec!["orders", "invoices"]);
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IronMqConfig::new("token", "project");

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            config.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        );
        assert!(config.queues.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let config = IronMqConfig::new("", "project");

        match config.validate() {
            Err(ConfigurationError::Missing { key }) => assert_eq!(key, "token"),
            other => panic!("expected Missing token, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_project_is_configuration_error() {
        let config = IronMqConfig::new("token", " ");

        match config.validate() {
            Err(ConfigurationError::Missing { key }) => assert_eq!(key, "project_id"),
            other => panic!("expected Missing project_id, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = IronMqConfig::new("token", "project").with_base_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));

        let config = IronMqConfig::new("token", "project").with_base_url("ftp://host/1/projects");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = IronMqConfig::new("token", "project").with_request_timeout_seconds(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_allow_list_rejected() {
        let config = IronMqConfig::new("token", "project").with_allowed_queues("a/b");
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));
    }
}

mod deserialization_tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: IronMqConfig = serde_json::from_value(serde_json::json!({
            "token": "abc",
            "project_id": "p1",
            "queues": "orders,invoices"
        }))
        .unwrap();

        assert_eq!(config.token.expose_secret(), "abc");
        assert_eq!(config.project_id, "p1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.allow_list().unwrap().len(), 2);
    }

    #[test]
    fn test_deserialize_without_credentials_fails_validation() {
        let config: IronMqConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(config.validate().is_err());
    }
}
