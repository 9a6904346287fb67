use crate::config::ServerConfig;
use crate::server::ROUTES;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn index_html(config: &ServerConfig) -> String {
    let title = escape(&config.app_name);
    let links: String = ROUTES
        .iter()
        .filter(|route| route.path != "/")
        .map(|route| {
            format!(
                "      <li><a href=\"{path}\"><code>{method} {path}</code></a> {desc}</li>\n",
                method = route.method,
                path = route.path,
                desc = escape(route.description),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 3rem auto; max-width: 42rem; color: #232f3e; }}
      h1 {{ color: #ff9900; }}
      code {{ background: #f3f3f3; padding: 0.1rem 0.3rem; }}
    </style>
  </head>
  <body>
    <h1>{title}</h1>
    <p>Version {version} running in <strong>{environment}</strong>{region}.</p>
    <ul>
{links}    </ul>
  </body>
</html>
"#,
        title = title,
        version = escape(&config.app_version),
        environment = escape(&config.environment),
        region = config
            .region
            .as_deref()
            .map(|r| format!(" ({})", escape(r)))
            .unwrap_or_default(),
        links = links,
    )
}
