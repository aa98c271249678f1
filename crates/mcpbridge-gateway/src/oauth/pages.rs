//! Browser-facing HTML pages

use mcpbridge_core::CsrfToken;

pub const APP_NAME: &str = "McpBridge";

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{APP_NAME} - {title}</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            background: linear-gradient(135deg, #0f0f23 0%, #1a1a2e 50%, #16213e 100%);
            color: #e6e6e6;
            padding: 1rem;
        }}
        .container {{ text-align: center; max-width: 420px; width: 100%; }}
        h1 {{ font-size: 1.5rem; font-weight: 600; margin-bottom: 0.75rem; color: #fff; }}
        .subtitle {{ color: #8892b0; margin-bottom: 1.5rem; line-height: 1.5; }}
        .client-id {{ font-size: 0.75rem; color: #6a7394; word-break: break-all; margin-bottom: 1.5rem; }}
        input[type=text] {{
            width: 100%;
            padding: 0.75rem;
            border-radius: 8px;
            border: 1px solid rgba(255,255,255,0.2);
            background: rgba(255,255,255,0.05);
            color: #fff;
            font-size: 1rem;
            margin-bottom: 1rem;
        }}
        .btn {{
            display: inline-block;
            background: linear-gradient(135deg, #64ffda 0%, #00bcd4 100%);
            color: #0f0f23;
            padding: 0.75rem 2rem;
            border-radius: 8px;
            font-weight: 500;
            cursor: pointer;
            border: none;
            font-size: 1rem;
        }}
        .note {{ font-size: 0.875rem; color: #6a7394; }}
    </style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>"#
    )
}

/// Authorize form for `Form` mode. The POST must come back with the hidden
/// fields untouched.
pub fn authorize_form(csrf: &CsrfToken, action: &str) -> String {
    let client_id = escape_html(&csrf.request.client_id);
    let body = format!(
        r#"        <h1>Connect your account</h1>
        <p class="subtitle">A client is asking to use your backend account through {APP_NAME}.</p>
        <p class="client-id">{client_id}</p>
        <form method="post" action="{action}">
            <input type="hidden" name="client_id" value="{client_id}">
            <input type="hidden" name="csrf_state" value="{csrf_state}">
            <input type="hidden" name="client_state" value="{client_state}">
            <input type="text" name="account" placeholder="Account" autocomplete="username">
            <button class="btn" type="submit">Continue</button>
        </form>
        <p class="note" style="margin-top: 1.5rem">The backend sign-in page opens next. Return to your client when you are done.</p>"#,
        action = escape_html(action),
        csrf_state = escape_html(csrf.value.as_str()),
        client_state = escape_html(csrf.associated_client_state()),
    );
    layout("Authorize", &body)
}

/// Landing page served by the callback listener
pub fn callback_landing(error: Option<&str>) -> String {
    let body = match error {
        None => r#"        <h1>Authorization received</h1>
        <p class="subtitle">You can close this window and return to your client.</p>
        <p class="note">Your client picks up the new session on its own.</p>"#
            .to_string(),
        Some(error) => format!(
            r#"        <h1>Authorization not completed</h1>
        <p class="subtitle">The backend reported: {}</p>
        <p class="note">Return to your client to start again.</p>"#,
            escape_html(error)
        ),
    };
    layout("Authorization", &body)
}
