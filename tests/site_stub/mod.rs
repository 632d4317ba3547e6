use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// One canned response. A route answers its responses in order and repeats the last one.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: format!("status {status}").into_bytes(),
        }
    }
}

/// A fake novel host plus a `translate_a/single` endpoint that prefixes every line with `[en] `.
pub struct SiteStub {
    pub base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl SiteStub {
    pub fn spawn(routes: Vec<(&str, Vec<Reply>)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let routes: HashMap<String, Vec<Reply>> = routes
            .into_iter()
            .map(|(path, replies)| (path.to_owned(), replies))
            .collect();
        let hits = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let server_hits = Arc::clone(&hits);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_owned();
                let seen = {
                    let mut hits = server_hits.lock().expect("lock hits");
                    let count = hits.entry(path.clone()).or_insert(0);
                    *count += 1;
                    *count
                };

                if path == "/translate_a/single" {
                    let _ = request.respond(translate_response(&url));
                    continue;
                }

                let reply = routes
                    .get(&path)
                    .and_then(|replies| replies.get(seen - 1).or_else(|| replies.last()))
                    .cloned()
                    .unwrap_or_else(|| Reply::status(404));
                let _ = request.respond(
                    tiny_http::Response::from_data(reply.body).with_status_code(reply.status),
                );
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("lock hits")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().expect("lock hits").values().sum()
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn translate_response(url: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let parsed = url::Url::parse(&format!("http://stub{url}")).expect("parse request url");
    let Some(q) = parsed
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
    else {
        return tiny_http::Response::from_string("missing q").with_status_code(400);
    };

    let body = serde_json::json!([[[format!("[en] {q}"), q, null, null, 10]], null, "ja"]);
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(200)
        .with_header(header)
}

#[allow(dead_code)]
pub fn syosetu_chapter(title: &str, lines: &[&str]) -> String {
    let body = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if line.is_empty() {
                format!("<p id=\"L{}\"><br /></p>", idx + 1)
            } else {
                format!("<p id=\"L{}\">{line}</p>", idx + 1)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<!DOCTYPE html>\n<html><body>\n<p class=\"novel_subtitle\">{title}</p>\n<div id=\"novel_honbun\">\n{body}\n</div>\n</body></html>"
    )
}

#[allow(dead_code)]
pub fn biquyun_toc(series_path: &str, codes: &[&str]) -> String {
    let entries = codes
        .iter()
        .map(|code| format!("<dd><a href=\"{series_path}{code}.html\">{code}</a></dd>"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<html><body><div id=\"list\"><dl>\n<dt>正文</dt>\n{entries}\n</dl></div></body></html>"
    )
}

#[allow(dead_code)]
pub fn config_json(base_url: &str) -> String {
    serde_json::json!({
        "hosts": [
            {"host_name": "Syosetu", "base_url": format!("{base_url}/")},
            {"host_name": "Biquyun", "base_url": format!("{base_url}/")}
        ],
        "series": [
            {"name": "NR", "title": "Naruto", "lang": "JP", "host": "Syosetu", "code": "n0001"},
            {"name": "WX", "lang": "CN", "host": "Biquyun", "code": "14_14055"}
        ],
        "translator": {"engine": "noop"}
    })
    .to_string()
}
