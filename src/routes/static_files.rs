//! Upload Form
//!
//! A single embedded page at `/` that posts to `/api/upload` and shows the
//! returned messages, with a link to the report when the run succeeded.

use axum::{response::Html, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Oxidized Analyst - Large File Analysis</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 720px; margin: 2rem auto; color: #1d1d1f; }
    h1 { margin-bottom: 0.5rem; }
    .card { border: 1px solid #ddd; padding: 1rem; border-radius: 8px; margin-bottom: 1rem; }
    button { margin-top: 1rem; padding: 0.6rem 1rem; }
    ul.messages { list-style: none; padding: 0; }
    ul.messages li { background: #eef6ff; border-left: 4px solid #2b7de9; padding: 0.5rem; margin: 0.4rem 0; }
    ul.messages li.error { background: #fdecea; border-left-color: #d93025; }
    pre { background: #f6f8fa; padding: 1rem; overflow: auto; }
  </style>
</head>
<body>
  <h1>Large File Analysis</h1>
  <p>Upload a CSV or XLSX file. It is read in chunks, summarized, and narrated by the configured language model.</p>

  <div class="card">
    <form id="uploadForm">
      <input id="fileInput" type="file" name="file" accept=".csv,.xlsx" />
      <button type="submit">Upload and analyze</button>
    </form>
  </div>

  <ul id="messages" class="messages"></ul>
  <div id="result"></div>

  <script>
    const form = document.getElementById('uploadForm');
    const messages = document.getElementById('messages');
    const result = document.getElementById('result');

    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      messages.innerHTML = '<li>Uploading and analyzing, this can take a while...</li>';
      result.innerHTML = '';

      const data = new FormData();
      const input = document.getElementById('fileInput');
      if (input.files.length > 0) {
        data.append('file', input.files[0]);
      }

      try {
        const response = await fetch('/api/upload', { method: 'POST', body: data });
        const body = await response.json();
        messages.innerHTML = '';
        for (const message of body.messages || []) {
          const li = document.createElement('li');
          li.textContent = message;
          if (body.status !== 'success') li.className = 'error';
          messages.appendChild(li);
        }
        if (body.status === 'success' && body.run_id) {
          result.innerHTML = '<p><a href="/api/reports/' + body.run_id + '">View report</a></p>'
            + '<pre>' + JSON.stringify(body.summary, null, 2) + '</pre>';
        }
      } catch (err) {
        messages.innerHTML = '<li class="error">Upload failed: ' + err + '</li>';
      }
    });
  </script>
</body>
</html>"#;
