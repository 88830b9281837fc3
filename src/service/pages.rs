//! Static HTML served by the provider.

use super::game::{DEFAULT_BOARD_SIZE, DEFAULT_WORDS};

/// `href` rooted at `base`, or a root-relative path when `base` is empty.
pub fn link(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

pub fn config_page(base: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Word Search - Config</title></head>
<body>
  <h2>Configuration - Word Search</h2>
  <p>Teacher configuration page for the activity provider.</p>
  <ul>
    <li><a href="{params}">GET /params</a></li>
    <li><a href="{deploy}">GET /deploy?activityID=TESTE123</a></li>
    <li><a href="{analytics}">GET /analytics/available</a></li>
  </ul>
  <form>
    <label>Board size: <input name="size" type="number" value="{size}"/></label><br/>
    <label>Words (comma separated): <input name="words" value="{words}"/></label><br/>
    <button type="button">Save</button>
  </form>
</body>
</html>"#,
        params = escape(&link(base, "/params")),
        deploy = escape(&link(base, "/deploy?activityID=TESTE123")),
        analytics = escape(&link(base, "/analytics/available")),
        size = DEFAULT_BOARD_SIZE,
        words = DEFAULT_WORDS.join(","),
    )
}

pub fn game_page(activity_id: &str, user_id: Option<&str>, access_count: u64) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Word Search</title></head>
<body>
  <h2>Word Search (demo) - activityID={activity}</h2>
  <p>userID: {user}</p>
  <p>Opening this page records a <code>game_access</code> event (access #{count}).</p>
</body>
</html>"#,
        activity = escape(activity_id),
        user = user_id.map(escape).unwrap_or_else(|| "-".to_string()),
        count = access_count,
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_follow_base() {
        assert_eq!(link("", "/params"), "/params");
        assert_eq!(link("https://ap.example/sub/", "/params"), "https://ap.example/sub/params");
        assert!(config_page("http://h").contains(r#"href="http://h/params""#));
    }

    #[test]
    fn test_config_page_escapes_base_url() {
        let html = config_page(r#"http://h"><script>x</script>"#);
        assert!(!html.contains("<script>"));
        assert!(html.contains(r#"href="http://h&quot;&gt;&lt;script&gt;x&lt;/script&gt;/params""#));
    }

    #[test]
    fn test_game_page_escapes_identifiers() {
        let html = game_page("<A>", Some("u&1"), 2);
        assert!(html.contains("activityID=&lt;A&gt;"));
        assert!(html.contains("userID: u&amp;1"));
        assert!(game_page("A", None, 1).contains("userID: -"));
    }
}
