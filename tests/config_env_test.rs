use fileguard::Settings;
use std::env;
use tempfile::TempDir;

// Single test: environment variables are process-wide
#[test]
fn test_env_overrides_nested_keys_and_verbatim_password() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fileguard.toml");
    std::fs::write(
        &config_path,
        r#"
monitor_folders = ["/srv/data"]
smtp_server = "smtp.example.com"
smtp_port = 587
sender_email = "sender@example.com"
receiver_emails = ["ops@example.com"]
email_password = "from-file"

[watcher]
tick_ms = 250
"#,
    )
    .unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("FILEGUARD_EMAIL_COOLDOWN_SECONDS", "300");
        env::set_var("FILEGUARD_WATCHER__COALESCE_WINDOW_MS", "750");
        env::set_var("FILEGUARD_ALERTS__NOTIFICATIONS", "false");
        env::set_var("FILEGUARD_EMAIL_PASSWORD", "123456");
    }

    let settings = Settings::load_from(&config_path);

    unsafe {
        env::remove_var("FILEGUARD_EMAIL_COOLDOWN_SECONDS");
        env::remove_var("FILEGUARD_WATCHER__COALESCE_WINDOW_MS");
        env::remove_var("FILEGUARD_ALERTS__NOTIFICATIONS");
        env::remove_var("FILEGUARD_EMAIL_PASSWORD");
    }

    let settings = settings.unwrap();
    assert_eq!(settings.email_cooldown_seconds, 300);
    assert_eq!(settings.watcher.coalesce_window_ms, 750);
    assert!(!settings.alerts.notifications);
    // Numeric-looking secrets still load as text
    assert_eq!(settings.email_password.expose(), "123456");
    // File values without overrides remain
    assert_eq!(settings.watcher.tick_ms, 250);
    assert_eq!(settings.smtp_port, 587);
    settings.validate().unwrap();

    // Passwords are taken verbatim, even when they parse as other types
    for raw in ["007", "1.5", "true", "123456"] {
        unsafe {
            env::set_var("FILEGUARD_EMAIL_PASSWORD", raw);
        }
        let loaded = Settings::load_from(&config_path);
        unsafe {
            env::remove_var("FILEGUARD_EMAIL_PASSWORD");
        }

        let loaded = loaded.unwrap_or_else(|e| panic!("{raw:?} failed to load: {e}"));
        assert_eq!(loaded.email_password.expose(), raw);
    }

    let from_file = Settings::load_from(&config_path).unwrap();
    assert_eq!(from_file.email_password.expose(), "from-file");
}
