//! Embedded landing page: live stream plus alert polling.

pub const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Exam Proctor</title>
  <style>
    body { font-family: sans-serif; margin: 2em; background: #111; color: #eee; }
    img { border: 1px solid #444; }
    #alerts li { color: #f55; }
  </style>
</head>
<body>
  <h1>Exam Proctor</h1>
  <img src="/video_feed" alt="live exam feed" width="640" height="480">
  <h2>Alerts</h2>
  <ul id="alerts"></ul>
  <script>
    async function refreshAlerts() {
      try {
        const res = await fetch('/get_alerts');
        const data = await res.json();
        const list = document.getElementById('alerts');
        list.innerHTML = '';
        for (const alert of data.alerts) {
          const item = document.createElement('li');
          item.textContent = alert;
          list.appendChild(item);
        }
      } catch (e) {
        // endpoint may be briefly unavailable during startup
      }
    }
    setInterval(refreshAlerts, 2000);
    refreshAlerts();
  </script>
</body>
</html>
"#;
