/// What the shell does with the hardware back button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackAction {
    GoBack,
    Exit,
}

pub fn on_back(can_go_back: bool) -> BackAction {
    if can_go_back {
        BackAction::GoBack
    } else {
        BackAction::Exit
    }
}

/// Only a failed main-frame load replaces the page; subresource errors are ignored.
pub fn should_show_fallback(is_main_frame: bool) -> bool {
    is_main_frame
}

/// Offline page shown when the app host cannot be reached. The Retry
/// button reloads the original url.
pub fn connection_error_page(url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Connection error</title>
<style>
body {{ font-family: sans-serif; background: #111; color: #eee; text-align: center; padding: 48px 24px; }}
button {{ margin-top: 24px; padding: 12px 32px; font-size: 16px; border: 0; border-radius: 8px; background: #e53935; color: #fff; }}
</style>
</head>
<body>
<h1>Connection error</h1>
<p>Could not reach the server. Check that it is running and that you are online.</p>
<button onclick="window.location.href='{url}'">Retry</button>
</body>
</html>
"#,
        url = escape_attribute(url)
    )
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("\\x27"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_action() {
        assert_eq!(on_back(true), BackAction::GoBack);
        assert_eq!(on_back(false), BackAction::Exit);
    }

    #[test]
    fn test_fallback_only_for_main_frame() {
        assert!(should_show_fallback(true));
        assert!(!should_show_fallback(false));
    }

    #[test]
    fn test_page_has_retry_for_url() {
        let page = connection_error_page("http://10.0.2.2:3000");
        assert!(page.contains("Retry"));
        assert!(page.contains("window.location.href='http://10.0.2.2:3000'"));
    }

    #[test]
    fn test_page_escapes_url() {
        let page = connection_error_page("http://x/'><script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("\\x27&gt;&lt;script&gt;"));
    }
}
