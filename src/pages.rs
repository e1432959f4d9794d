//! Inline HTML pages. The UI is deliberately small: a chat box wired to
//! `/api/gemini` plus the two credential forms.

use axum::response::Html;

use crate::auth::session::{CurrentUser, Flash, FlashKind};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 640px; margin: 2rem auto; padding: 0 1rem; color: #222; }
header { display: flex; justify-content: space-between; align-items: baseline; margin-bottom: 1.5rem; }
form.card, main.card { border: 1px solid #ddd; border-radius: 8px; padding: 1.5rem; }
label { display: block; margin-top: 1rem; }
input, textarea { width: 100%; box-sizing: border-box; padding: 0.5rem; margin-top: 0.25rem; }
button { margin-top: 1rem; padding: 0.5rem 1.25rem; }
pre#output { white-space: pre-wrap; background: #f6f6f6; padding: 1rem; border-radius: 6px; min-height: 3rem; }
.flash { padding: 0.5rem 0.75rem; border-radius: 6px; margin-bottom: 0.5rem; }
.flash-success { background: #e6f4ea; color: #1e4620; }
.flash-error { background: #fce8e6; color: #5f2120; }
"#;

const CHAT_SCRIPT: &str = r#"
const form = document.getElementById('chat');
const output = document.getElementById('output');
form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const prompt = document.getElementById('prompt').value;
    output.textContent = 'Thinking...';
    try {
        const response = await fetch('/api/gemini', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ prompt }),
        });
        const data = await response.json();
        if (!response.ok) {
            output.textContent = data.error || 'Request failed.';
            return;
        }
        const text = data.candidates?.[0]?.content?.parts?.[0]?.text;
        output.textContent = text || JSON.stringify(data, null, 2);
    } catch (err) {
        output.textContent = 'Request failed.';
    }
});
"#;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = title,
        style = STYLE,
        body = body,
    ))
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            let class = match flash.kind {
                FlashKind::Success => "flash flash-success",
                FlashKind::Error => "flash flash-error",
            };
            // Flash messages are server-authored constants, safe to inline.
            format!(r#"<p class="{class}">{message}</p>"#, message = flash.message)
        })
        .collect()
}

fn render_chat(username: Option<&str>) -> Html<String> {
    // Usernames match [A-Za-z0-9_]{3,20}, so plain interpolation is safe.
    let header = match username {
        Some(name) => format!(
            r#"<header><h1>Gemchat</h1><span>Signed in as <strong>{name}</strong> &middot; <a href="/logout">Log out</a></span></header>"#
        ),
        None => r#"<header><h1>Gemchat</h1></header>"#.to_string(),
    };
    let body = format!(
        r#"{header}
<main class="card">
<form id="chat">
<label for="prompt">Prompt</label>
<textarea id="prompt" rows="4" required></textarea>
<button type="submit">Send</button>
</form>
<pre id="output"></pre>
</main>
<script>{script}</script>"#,
        header = header,
        script = CHAT_SCRIPT,
    );
    page("Gemchat", &body)
}

/// GET / in the authenticated variant.
pub async fn index(CurrentUser(user): CurrentUser) -> Html<String> {
    render_chat(Some(&user.username))
}

/// GET / in the unauthenticated variant.
pub async fn index_public() -> Html<String> {
    render_chat(None)
}

pub fn login(flashes: &[Flash]) -> Html<String> {
    let body = format!(
        r#"<header><h1>Log in</h1></header>
{flashes}
<form class="card" method="post" action="/login">
<label for="username">Username</label>
<input id="username" name="username" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" required>
<button type="submit">Log in</button>
<p>No account? <a href="/register">Register</a></p>
</form>"#,
        flashes = render_flashes(flashes),
    );
    page("Log in", &body)
}

pub fn register(flashes: &[Flash]) -> Html<String> {
    let body = format!(
        r#"<header><h1>Register</h1></header>
{flashes}
<form class="card" method="post" action="/register">
<label for="username">Username</label>
<input id="username" name="username" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" required>
<button type="submit">Create account</button>
<p>Already registered? <a href="/login">Log in</a></p>
</form>"#,
        flashes = render_flashes(flashes),
    );
    page("Register", &body)
}
