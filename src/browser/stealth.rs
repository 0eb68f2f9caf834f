use crate::core::config::BrowserOptions;

/// Chrome flags that drop the automation banner and the `AutomationControlled`
/// blink feature.
pub const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Page patches in the manner of puppeteer-extra-plugin-stealth. Each one runs
/// in its own block so a failing patch leaves the others in place.
const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // window.chrome
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    }
    "#,
    // permissions
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
    // plugins
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
];

/// One script for `Page.addScriptToEvaluateOnNewDocument`.
pub fn stealth_script() -> String {
    STEALTH_SCRIPTS
        .iter()
        .map(|script| format!("try {{{}}} catch (e) {{}}", script))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Launch flags: the stealth set when enabled, then the user's own.
pub fn launch_args(options: &BrowserOptions) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if options.stealth {
        args.extend(STEALTH_ARGS.iter().map(|arg| arg.to_string()));
    }
    for arg in &options.args {
        if !args.contains(arg) {
            args.push(arg.clone());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_with_stealth() {
        let mut options = BrowserOptions::default();
        options.args = vec![
            "--lang=en-US".to_string(),
            "--disable-infobars".to_string(),
        ];

        let args = launch_args(&options);

        assert_eq!(args[0], "--disable-blink-features=AutomationControlled");
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
        assert_eq!(
            args.iter().filter(|a| a.as_str() == "--disable-infobars").count(),
            1
        );
    }

    #[test]
    fn test_launch_args_without_stealth() {
        let mut options = BrowserOptions::default().without_stealth();
        options.args = vec!["--lang=en-US".to_string()];

        assert_eq!(launch_args(&options), vec!["--lang=en-US".to_string()]);
    }

    #[test]
    fn test_stealth_script_isolates_each_patch() {
        let script = stealth_script();

        assert!(script.contains("navigator, 'webdriver'"));
        assert!(script.contains("navigator, 'plugins'"));
        assert_eq!(script.matches("try {").count(), STEALTH_SCRIPTS.len());
        assert_eq!(script.matches("catch (e) {}").count(), STEALTH_SCRIPTS.len());
    }
}
