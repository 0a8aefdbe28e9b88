//! Tests for logging configuration.

use super::*;

mod level_translation_tests {
    use super::*;

    fn directive(level: &str) -> Result<&'static str, ConfigurationError> {
        LoggingConfig {
            level: level.to_string(),
            json_format: false,
        }
        .filter_directive()
    }

    #[test]
    fn test_dotnet_level_names() {
        assert_eq!(directive("Trace").unwrap(), "trace");
        assert_eq!(directive("Debug").unwrap(), "debug");
        assert_eq!(directive("Information").unwrap(), "info");
        assert_eq!(directive("Warning").unwrap(), "warn");
        assert_eq!(directive("Error").unwrap(), "error");
        assert_eq!(directive("Critical").unwrap(), "error");
        assert_eq!(directive("None").unwrap(), "off");
    }

    #[test]
    fn test_tracing_level_names() {
        for level in ["trace", "debug", "info", "warn", "error", "off"] {
            assert_eq!(directive(level).unwrap(), level);
        }
    }

    #[test]
    fn test_empty_level_defaults_to_info() {
        assert_eq!(directive("  ").unwrap(), "info");
        assert_eq!(LoggingConfig::default().filter_directive().unwrap(), "info");
    }

    #[test]
    fn test_unknown_level_rejected() {
        let error = directive("loud").unwrap_err();
        assert!(matches!(error, ConfigurationError::Invalid { key, .. } if key == LOG_LEVEL_KEY));
    }
}

mod init_tests {
    use super::*;

    /// Only one global subscriber can be installed per process.
    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: "Warning".to_string(),
            json_format: true,
        };

        let _ = init_logging(&config);
        let result = init_logging(&config);

        assert!(matches!(result, Err(ConfigurationError::Logging { .. })));
    }

    #[test]
    fn test_invalid_level_fails_before_install() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            json_format: false,
        };

        assert!(matches!(
            init_logging(&config),
            Err(ConfigurationError::Invalid { .. })
        ));
    }
}
